//! Oracle error types.

use thiserror::Error;

/// Result type for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

/// Errors talking to the analysis oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle configuration error: {0}")]
    Config(String),

    #[error("Oracle request failed: {0}")]
    Request(String),

    #[error("Oracle API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Remote processing failed: {0}")]
    Processing(String),

    #[error("Unparseable oracle response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OracleError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Connection failures, rate limits and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Request(_) => true,
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        OracleError::Request(e.to_string())
    }
}
