use thiserror::Error;

/// Failure classes of a production run.
///
/// Collaborators return these; the orchestrator decides whether a failure
/// aborts the run with [`PipelineError::is_fatal`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One feed extractor failed. That feed contributes nothing to the run.
    #[error("source '{feed}' failed: {message}")]
    Source { feed: String, message: String },

    #[error("enhancement response unusable: {0}")]
    EnrichmentParse(String),

    /// Run-level metadata could not be parsed even after repair.
    #[error("metadata response unusable: {0}")]
    MetadataParse(String),

    #[error("image generation failed: {0}")]
    ImageGeneration(String),

    #[error("video assembly failed: {0}")]
    Assembly(String),

    /// The refresh token was rejected. Needs a manual re-authentication.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::Source { .. } | PipelineError::MetadataParse(_))
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, PipelineError::AuthExpired(_))
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_source_and_metadata_failures_are_absorbed() {
        let absorbed = [
            PipelineError::Source { feed: "phys.org".into(), message: "503".into() },
            PipelineError::MetadataParse("not json".into()),
        ];
        assert!(absorbed.iter().all(|e| !e.is_fatal()));

        let fatal = [
            PipelineError::EnrichmentParse("missing Image_prompt".into()),
            PipelineError::ImageGeneration("no url".into()),
            PipelineError::Assembly("status 500".into()),
            PipelineError::AuthExpired("invalid_grant".into()),
            PipelineError::Storage(sqlx::Error::PoolClosed),
            PipelineError::Timeout { stage: "assembly", seconds: 480 },
        ];
        assert!(fatal.iter().all(|e| e.is_fatal()));
    }

    #[test]
    fn timeout_message_names_stage() {
        let err = PipelineError::Timeout { stage: "assembly", seconds: 480 };
        assert_eq!(err.to_string(), "assembly timed out after 480s");
    }
}
