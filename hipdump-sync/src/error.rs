//! Mirror error types.

use thiserror::Error;

/// Result type for mirror operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while mirroring history and assets.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no download URL for file {0}")]
    MissingDownloadUrl(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// True for failures of the remote call itself (connection, timeout,
    /// non-success status). These abort one entity, never the whole run.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Http(_) | SyncError::Api(_))
    }

    /// True when the caller must stop before any network activity.
    pub fn is_config(&self) -> bool {
        matches!(self, SyncError::Config(_))
    }
}
