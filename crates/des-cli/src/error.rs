//! Error types for the DES CLI

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// User-facing CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Request file is missing
    #[error("File not found: '{}'. Verify the file path exists and you have read permissions.", .0.display())]
    FileNotFound(PathBuf),

    /// Request file is not a valid request document
    #[error("Invalid request in '{}': {source}", .path.display())]
    InvalidRequest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The run was interrupted before it finished
    #[error("Interrupted: the running tool was stopped and nothing was cleaned up")]
    Cancelled,

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions.")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<des_common::Cancelled> for CliError {
    fn from(_: des_common::Cancelled) -> Self {
        CliError::Cancelled
    }
}
