//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while rendering clips.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid clip: {0}")]
    InvalidClip(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid clip error.
    pub fn invalid_clip(message: impl Into<String>) -> Self {
        Self::InvalidClip(message.into())
    }

    /// Stable snake_case tag for manifests.
    pub fn tag(&self) -> &'static str {
        match self {
            MediaError::FfmpegNotFound => "ffmpeg_not_found",
            MediaError::FfmpegFailed { .. } => "ffmpeg_failed",
            MediaError::FileNotFound(_) => "file_not_found",
            MediaError::InvalidClip(_) => "invalid_clip",
            MediaError::Cancelled => "cancelled",
            MediaError::Timeout(_) => "timeout",
            MediaError::Io(_) => "io",
        }
    }
}
