//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String, transient: bool },

    #[error("Source exceeds maximum size of {limit} bytes")]
    SourceTooLarge { limit: u64 },

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Scene detection failed: {0}")]
    DetectionFailed(String),
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

    /// Create a download failure that is worth retrying.
    pub fn download_transient(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
            transient: true,
        }
    }

    /// Create a download failure that will not improve on retry.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
            transient: false,
        }
    }

    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Check if the error is transient (network hiccup, busy server).
    pub fn is_transient(&self) -> bool {
        match self {
            MediaError::DownloadFailed { transient, .. } => *transient,
            MediaError::Timeout(_) | MediaError::Io(_) => true,
            _ => false,
        }
    }

    /// Short human-readable message including the tail of stderr when present.
    pub fn detail(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                ..
            }
            | MediaError::FfprobeFailed {
                message,
                stderr: Some(stderr),
            } if !stderr.trim().is_empty() => {
                let last = stderr.lines().last().unwrap_or_default();
                format!("{}: {}", message, last.trim())
            }
            other => other.to_string(),
        }
    }
}
