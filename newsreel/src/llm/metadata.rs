use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{provider_failure, repair_json, LlmProvider, LlmRequest};
use crate::error::{PipelineError, PipelineResult};

const SYSTEM_PROMPT: &str = r#"You are a strategist for short-form video metadata about AI, machine learning, quantum computing, science and technology.
You receive a JSON array of texts alternating headline and summary: ["Headline 1", "Summary 1", "Headline 2", "Summary 2", ...].
From all of them together produce:
- title: one click-worthy video title of at most 60 characters, using strong words and a curiosity gap
- description: one engaging description of at most 200 characters that opens with a hook and ends with 3-5 hashtags such as #AI #TechNews #Shorts

Return ONLY a single JSON object, without commentary:
{"title": "...", "description": "..."}"#;

/// One title and description for the whole video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedMetadata {
    pub title: String,
    pub description: String,
}

#[async_trait::async_trait]
pub trait MetadataSynthesizer: Send + Sync {
    /// `texts` alternates enhanced title and summary, in frame order.
    ///
    /// A response that cannot be parsed degrades to empty strings; only
    /// transport failures are errors.
    async fn synthesize(&self, texts: &[String]) -> PipelineResult<SynthesizedMetadata>;
}

pub struct LlmMetadataSynthesizer {
    provider: Arc<dyn LlmProvider>,
}

impl LlmMetadataSynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

/// Repair and parse a metadata answer. A one-element array around the object is accepted.
pub fn parse_metadata(text: &str) -> PipelineResult<SynthesizedMetadata> {
    let repaired = repair_json(text)
        .ok_or_else(|| PipelineError::MetadataParse(format!("no JSON in: {}", text)))?;
    let value: Value = serde_json::from_str(&repaired)
        .map_err(|e| PipelineError::MetadataParse(format!("{} (repaired: {})", e, repaired)))?;

    let object = match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    if !object.is_object() {
        return Err(PipelineError::MetadataParse(format!("expected an object, got {}", object)));
    }

    let field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    Ok(SynthesizedMetadata {
        title: field("title"),
        description: field("description"),
    })
}

#[async_trait::async_trait]
impl MetadataSynthesizer for LlmMetadataSynthesizer {
    async fn synthesize(&self, texts: &[String]) -> PipelineResult<SynthesizedMetadata> {
        let prompt = serde_json::to_string(texts)
            .map_err(|e| PipelineError::Llm(format!("failed to encode texts: {}", e)))?;
        let request = LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt,
            ..Default::default()
        };

        let response = self.provider.generate(request).await.map_err(provider_failure)?;

        match parse_metadata(&response.content) {
            Ok(meta) => Ok(meta),
            Err(e) => {
                warn!(error = %e, "metadata: falling back to empty title/description");
                Ok(SynthesizedMetadata::default())
            }
        }
    }
}
