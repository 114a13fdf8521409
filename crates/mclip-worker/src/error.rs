//! Worker error types.

use mclip_models::{PolicyHalt, WordTimingError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Moment detection failed: {0}")]
    DetectionFailed(String),

    #[error("Invalid word timings: {0}")]
    WordTimings(#[from] WordTimingError),

    #[error("Pipeline halted: {0}")]
    Halted(#[from] PolicyHalt),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] mclip_media::MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn detection_failed(msg: impl Into<String>) -> Self {
        Self::DetectionFailed(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::DetectionFailed(_) => true,
            WorkerError::Media(e) => matches!(
                e,
                mclip_media::MediaError::Timeout(_) | mclip_media::MediaError::FfmpegFailed { .. }
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mclip_media::MediaError;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::detection_failed("502").is_retryable());
        assert!(WorkerError::from(MediaError::Timeout(30)).is_retryable());
        assert!(!WorkerError::config_error("missing").is_retryable());
        assert!(!WorkerError::from(MediaError::Cancelled).is_retryable());
        assert!(!WorkerError::Cancelled.is_retryable());
    }
}
