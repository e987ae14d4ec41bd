use std::sync::Arc;
use std::time::Duration;

use common::{OverlayStyle, PipelineConfig};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::assembler::{AudioPicker, VideoAssembler};
use crate::batch::BatchSelector;
use crate::error::PipelineResult;
use crate::imaging::ImageProducer;
use crate::llm::{ContentEnhancer, MetadataSynthesizer, SynthesizedMetadata};
use crate::sources::NewsAggregator;

/// Outcome of one production run.
///
/// `success` with no `video` means there was nothing new to produce.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub success: bool,
    #[serde(skip)]
    pub video: Option<Vec<u8>>,
    pub frame_count: usize,
    pub title: String,
    pub description: String,
    pub error: Option<String>,
}

impl RunResult {
    fn nothing_new() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
            ..Default::default()
        }
    }
}

/// External services a run is charged against.
#[derive(Clone)]
pub struct Collaborators {
    pub enhancer: Arc<dyn ContentEnhancer>,
    pub images: Arc<dyn ImageProducer>,
    pub metadata: Arc<dyn MetadataSynthesizer>,
    pub audio: Arc<dyn AudioPicker>,
    pub assembler: Arc<dyn VideoAssembler>,
}

/// Drives one run: candidates, batch admission, per-article frames, metadata, video.
pub struct RunOrchestrator {
    aggregator: NewsAggregator,
    selector: BatchSelector,
    collaborators: Collaborators,
    batch_size: usize,
    inter_article_delay: Duration,
    overlay: OverlayStyle,
}

impl RunOrchestrator {
    pub fn new(
        aggregator: NewsAggregator,
        selector: BatchSelector,
        collaborators: Collaborators,
        pipeline: &PipelineConfig,
        overlay: &OverlayStyle,
    ) -> Self {
        Self {
            aggregator,
            selector,
            collaborators,
            batch_size: pipeline.batch_size,
            inter_article_delay: Duration::from_secs(pipeline.inter_article_delay_seconds),
            overlay: overlay.clone(),
        }
    }

    /// Perform one run. Never panics on collaborator failure; the error is in the result.
    pub async fn run(&self) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);

        async {
            info!("run: starting");
            match self.execute().await {
                Ok(result) => {
                    info!(frames = result.frame_count, title = %result.title, "run: finished");
                    result
                }
                Err(e) => {
                    error!(error = %e, "run: aborted");
                    RunResult::failed(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self) -> PipelineResult<RunResult> {
        let candidates = self.aggregator.fetch().await;
        info!(candidates = candidates.len(), "run: candidates ranked");

        let batch = match self.selector.select_next_batch(&candidates, self.batch_size).await? {
            Some(batch) => batch,
            None => {
                info!("run: no new batch, nothing to produce");
                return Ok(RunResult::nothing_new());
            }
        };

        let c = &self.collaborators;
        let mut frames: Vec<Vec<u8>> = Vec::with_capacity(batch.len() * 2);
        let mut texts: Vec<String> = Vec::with_capacity(batch.len() * 2);

        for (idx, article) in batch.iter().enumerate() {
            if idx > 0 && !self.inter_article_delay.is_zero() {
                tokio::time::sleep(self.inter_article_delay).await;
            }
            info!(title = %article.title, position = idx, "run: processing article");

            let enhanced = c.enhancer.enhance(&article.title, &article.summary).await?;
            let background = c.images.generate(&enhanced.image_prompt).await?;

            // Both variants come from the same background.
            let title_frame = c.images.overlay_title(&background, &enhanced.enhanced_title).await?;
            let card_frame = c
                .images
                .overlay_title_and_summary(
                    &background,
                    &enhanced.enhanced_title,
                    &enhanced.enhanced_summary,
                    &self.overlay,
                )
                .await?;

            frames.push(title_frame);
            frames.push(card_frame);
            texts.push(enhanced.enhanced_title);
            texts.push(enhanced.enhanced_summary);
        }

        let metadata = match c.metadata.synthesize(&texts).await {
            Ok(m) => m,
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "run: metadata unusable, continuing without");
                SynthesizedMetadata::default()
            }
            Err(e) => return Err(e),
        };

        let audio = c.audio.pick().await?;
        let video = c.assembler.assemble(&frames, &audio).await?;
        info!(bytes = video.len(), frames = frames.len(), "run: video assembled");

        Ok(RunResult {
            success: true,
            video: Some(video),
            frame_count: frames.len(),
            title: metadata.title,
            description: metadata.description,
            error: None,
        })
    }
}
