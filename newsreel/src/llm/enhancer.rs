use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{extract_json_from_text, provider_failure, LlmProvider, LlmRequest};
use crate::error::{PipelineError, PipelineResult};

const SYSTEM_PROMPT: &str = r#"You write hooks for vertical infographic shorts about science and technology news.
Turn the given title and summary into:
- Enhanced_title: a short, curiosity-driven title that stops viewers from scrolling
- Enhanced_summary: one or two punchy sentences that build intrigue and end on a cliffhanger
- Image_prompt: a detailed prompt for a striking background image

Guidelines:
- Use vivid, emotional wording and a few well-placed emojis; avoid academic tone and passive voice.
- Stay faithful to the facts of the article.
- The image is vertical (9:16), modern and cinematic, high contrast, with vibrant colours that pop on mobile,
  and leaves clean space where text will be overlaid.

Return ONLY a JSON object with exactly these keys, no markdown:
{"Enhanced_title": "...", "Enhanced_summary": "...", "Image_prompt": "..."}"#;

/// Per-article content derived for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedContent {
    #[serde(rename = "Enhanced_title")]
    pub enhanced_title: String,
    #[serde(rename = "Enhanced_summary")]
    pub enhanced_summary: String,
    #[serde(rename = "Image_prompt")]
    pub image_prompt: String,
}

#[async_trait::async_trait]
pub trait ContentEnhancer: Send + Sync {
    /// Rewrite one article into a hook. A malformed answer is an `EnrichmentParse` error.
    async fn enhance(&self, title: &str, summary: &str) -> PipelineResult<EnhancedContent>;
}

pub struct LlmContentEnhancer {
    provider: Arc<dyn LlmProvider>,
}

impl LlmContentEnhancer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EnhancedJson {
    #[serde(rename = "Enhanced_title")]
    enhanced_title: String,
    #[serde(rename = "Enhanced_summary")]
    enhanced_summary: String,
    #[serde(rename = "Image_prompt")]
    image_prompt: String,
}

/// Strict parse: one object with exactly the three keys, none of them blank.
pub fn parse_enhanced(text: &str) -> PipelineResult<EnhancedContent> {
    let json = extract_json_from_text(text)
        .ok_or_else(|| PipelineError::EnrichmentParse(format!("no JSON object in: {}", text)))?;
    let parsed: EnhancedJson = serde_json::from_str(&json)
        .map_err(|e| PipelineError::EnrichmentParse(format!("{} (input was: {})", e, json)))?;

    let fields = [
        ("Enhanced_title", &parsed.enhanced_title),
        ("Enhanced_summary", &parsed.enhanced_summary),
        ("Image_prompt", &parsed.image_prompt),
    ];
    if let Some((key, _)) = fields.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(PipelineError::EnrichmentParse(format!("empty value for {}", key)));
    }

    Ok(EnhancedContent {
        enhanced_title: parsed.enhanced_title.trim().to_string(),
        enhanced_summary: parsed.enhanced_summary.trim().to_string(),
        image_prompt: parsed.image_prompt.trim().to_string(),
    })
}

#[async_trait::async_trait]
impl ContentEnhancer for LlmContentEnhancer {
    async fn enhance(&self, title: &str, summary: &str) -> PipelineResult<EnhancedContent> {
        let request = LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt: format!("Title: {}\nSummary: {}", title, summary),
            ..Default::default()
        };

        let response = self.provider.generate(request).await.map_err(provider_failure)?;
        debug!(model = %response.model, tokens = response.usage.total_tokens, "enhancer: response received");

        parse_enhanced(&response.content).map_err(|e| {
            warn!(%title, error = %e, "enhancer: unusable response");
            e
        })
    }
}
