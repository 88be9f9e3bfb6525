//! Error taxonomy for the generation pipeline.
//!
//! Every failure a stage can produce is a variant here, so callers and tests
//! can match on the kind instead of parsing message text. Transport-level
//! failures from reqwest (connection errors, timeouts, TLS) all convert into
//! `Upstream`.

use std::io;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("API token not configured")]
    NotConfigured,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("malformed upstream result: {0}")]
    InvalidUpstreamResult(String),

    #[error("artifact download failed with HTTP status {0}")]
    DownloadFailed(u16),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::Upstream(format!("request timed out: {}", err))
        } else {
            PipelineError::Upstream(err.to_string())
        }
    }
}
