//! Worker error types.

use thiserror::Error;
use vscene_media::MediaError;
use vscene_oracle::OracleError;
use vscene_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Pipeline failures, one variant per failure class reported to clients.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Scene detection timed out after {0} seconds")]
    DetectionTimeout(u64),

    #[error("Scene detection failed: {0}")]
    Detection(String),

    #[error("Clip extraction failed: {message}")]
    ClipExtraction { message: String, retryable: bool },

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Job registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Extraction failure classified from the media error behind it.
    pub fn extraction(err: &MediaError) -> Self {
        Self::ClipExtraction {
            message: err.detail(),
            retryable: err.is_transient(),
        }
    }

    /// Stable snake_case kind exposed next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => "validation_error",
            WorkerError::Download(_) => "download_error",
            WorkerError::Transcode(_) => "transcode_error",
            WorkerError::DetectionTimeout(_) => "detection_timeout",
            WorkerError::Detection(_) => "detection_error",
            WorkerError::ClipExtraction { .. } => "clip_extraction_error",
            WorkerError::Publish(_) => "publish_error",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::Registry(_) => "registry_error",
            WorkerError::Config(_) => "config_error",
            WorkerError::Internal(_) => "internal_error",
        }
    }

    /// Check if a per-clip error is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Publish(_) | WorkerError::Download(_) => true,
            WorkerError::ClipExtraction { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<StorageError> for WorkerError {
    fn from(e: StorageError) -> Self {
        WorkerError::Publish(e.to_string())
    }
}

impl From<OracleError> for WorkerError {
    fn from(e: OracleError) -> Self {
        WorkerError::Detection(e.to_string())
    }
}
