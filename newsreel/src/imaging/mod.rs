use common::OverlayStyle;

use crate::error::PipelineResult;

pub mod generate;
pub mod overlay;

pub use generate::HttpImageProducer;

/// Background generation plus the two frame variants derived from one background.
///
/// All images are encoded bytes (PNG for produced frames).
#[async_trait::async_trait]
pub trait ImageProducer: Send + Sync {
    /// Generate a blurred background for `prompt`.
    async fn generate(&self, prompt: &str) -> PipelineResult<Vec<u8>>;

    /// Title-only variant.
    async fn overlay_title(&self, image: &[u8], title: &str) -> PipelineResult<Vec<u8>>;

    /// Title + summary variant, letterboxed to 9:16.
    async fn overlay_title_and_summary(
        &self,
        image: &[u8],
        title: &str,
        summary: &str,
        style: &OverlayStyle,
    ) -> PipelineResult<Vec<u8>>;
}
