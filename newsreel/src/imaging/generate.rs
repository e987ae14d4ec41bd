use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use common::{ImagesConfig, OverlayStyle};
use image::ImageFormat;
use resvg::usvg::fontdb;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{overlay, ImageProducer};
use crate::error::{PipelineError, PipelineResult};

/// Image-generation endpoint client (Together-style `/v1/images/generations`)
/// with local compositing for the frame variants.
pub struct HttpImageProducer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    width: u32,
    height: u32,
    steps: u32,
    blur_sigma: f32,
    timeout: Duration,
    fonts: Arc<fontdb::Database>,
}

impl HttpImageProducer {
    pub fn new(cfg: &ImagesConfig, api_key: impl Into<String>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        info!(faces = db.len(), "imaging: system fonts loaded");
        Self::with_fonts(cfg, api_key, Arc::new(db))
    }

    /// Use a prepared font database, e.g. an empty one in tests.
    pub fn with_fonts(
        cfg: &ImagesConfig,
        api_key: impl Into<String>,
        fonts: Arc<fontdb::Database>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: cfg.api_url.clone(),
            api_key: api_key.into(),
            model: cfg.model.clone(),
            width: cfg.width,
            height: cfg.height,
            steps: cfg.steps,
            blur_sigma: cfg.blur_sigma,
            timeout: Duration::from_secs(cfg.timeout_seconds),
            fonts,
        }
    }

    async fn with_timeout<T, F>(&self, fut: F) -> PipelineResult<T>
    where
        F: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: "image generation",
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| PipelineError::ImageGeneration(format!("HTTP request failed: {}", e)))
    }

    async fn download(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let response = self.with_timeout(self.client.get(url).send()).await?;
        if !response.status().is_success() {
            return Err(PipelineError::ImageGeneration(format!(
                "image download failed with status: {}",
                response.status()
            )));
        }
        let bytes = self.with_timeout(response.bytes()).await?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    width: u32,
    height: u32,
    steps: u32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    b64_json: Option<String>,
}

/// Gaussian blur, re-encoded as PNG.
pub fn blur_png(bytes: &[u8], sigma: f32) -> PipelineResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::ImageGeneration(format!("undecodable image: {}", e)))?;
    let blurred = if sigma > 0.0 { img.blur(sigma) } else { img };
    let mut out = Vec::new();
    blurred
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| PipelineError::ImageGeneration(format!("PNG encoding failed: {}", e)))?;
    Ok(out)
}

async fn blocking<T, F>(f: F) -> PipelineResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::ImageGeneration(format!("image task failed: {}", e)))?
}

#[async_trait::async_trait]
impl ImageProducer for HttpImageProducer {
    async fn generate(&self, prompt: &str) -> PipelineResult<Vec<u8>> {
        let body = GenerationRequest {
            model: &self.model,
            prompt,
            width: self.width,
            height: self.height,
            steps: self.steps,
        };

        let response = self
            .with_timeout(
                self.client
                    .post(&self.api_url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .json(&body)
                    .send(),
            )
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::ImageGeneration(format!(
                "HTTP error! status: {}\n{}",
                status, text
            )));
        }

        let parsed: GenerationResponse = self.with_timeout(response.json()).await?;
        let first = parsed.data.into_iter().next();
        let raw = match first {
            Some(GeneratedImage { url: Some(url), .. }) => {
                debug!(%url, "imaging: downloading generated image");
                self.download(&url).await?
            }
            Some(GeneratedImage { b64_json: Some(b64), .. }) => base64::engine::general_purpose::STANDARD
                .decode(b64.as_bytes())
                .map_err(|e| PipelineError::ImageGeneration(format!("bad b64_json: {}", e)))?,
            _ => {
                return Err(PipelineError::ImageGeneration(
                    "image URL not found in API response".to_string(),
                ))
            }
        };

        let sigma = self.blur_sigma;
        blocking(move || blur_png(&raw, sigma)).await
    }

    async fn overlay_title(&self, image: &[u8], title: &str) -> PipelineResult<Vec<u8>> {
        let image = image.to_vec();
        let title = title.to_string();
        let fonts = self.fonts.clone();
        blocking(move || overlay::render_title_frame(&image, &title, &fonts)).await
    }

    async fn overlay_title_and_summary(
        &self,
        image: &[u8],
        title: &str,
        summary: &str,
        style: &OverlayStyle,
    ) -> PipelineResult<Vec<u8>> {
        let image = image.to_vec();
        let title = title.to_string();
        let summary = summary.to_string();
        let style = style.clone();
        let fonts = self.fonts.clone();
        blocking(move || overlay::render_text_card(&image, &title, &summary, &style, &fonts)).await
    }
}
