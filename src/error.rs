//! Run-level error taxonomy
//!
//! Every collaborator failure is classified into one of these kinds before it
//! reaches orchestration logic (see [`crate::collab`]).

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced at the orchestrator boundary
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid or missing settings. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No eligible media (or the store could not be read) for this run.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Text service failed or returned unusable output.
    #[error("text generation failed: {0}")]
    Generation(String),

    /// Media engine failure. No artifact is left behind.
    #[error("render failed: {0}")]
    Render(String),

    /// Notification or archive upload failed. The artifact is kept on disk.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The run exceeded its wall-clock ceiling.
    #[error("run exceeded wall-clock ceiling of {}s", .0.as_secs())]
    Timeout(Duration),

    /// Layout engine input validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Stable short label used in logs and CLI output
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::SourceUnavailable(_) => "source-unavailable",
            Self::Generation(_) => "generation",
            Self::Render(_) => "render",
            Self::Delivery(_) => "delivery",
            Self::Timeout(_) => "timeout",
            Self::InvalidInput(_) => "invalid-input",
        }
    }

    /// Whether a fresh run (next scheduled slot) may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::Render(_) | Self::Delivery(_) | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(PipelineError::Configuration("x".into()).kind(), "configuration");
        assert_eq!(PipelineError::Timeout(Duration::from_secs(5)).kind(), "timeout");
    }

    #[test]
    fn test_retryable() {
        assert!(!PipelineError::Configuration("bad".into()).is_retryable());
        assert!(!PipelineError::Generation("empty".into()).is_retryable());
        assert!(PipelineError::Render("ffmpeg".into()).is_retryable());
        assert!(PipelineError::SourceUnavailable("none".into()).is_retryable());
    }

    #[test]
    fn test_timeout_display() {
        let err = PipelineError::Timeout(Duration::from_secs(900));
        assert_eq!(err.to_string(), "run exceeded wall-clock ceiling of 900s");
    }
}
