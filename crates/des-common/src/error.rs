//! Error types for DES

use thiserror::Error;

/// Result type alias for DES operations
pub type Result<T> = std::result::Result<T, DesError>;

/// Failure causes of a transfer or export stage.
///
/// Every variant except [`DesError::Cancelled`] is converted into a terminal
/// status at the top of the public operations; callers only ever observe
/// `SUCCESS` or `FAILED` plus the log stream.
#[derive(Error, Debug)]
pub enum DesError {
    #[error("Command construction failed: {0}")]
    CommandConstruction(String),

    #[error("Source path not found: {0}")]
    SourceNotFound(String),

    #[error("Failed to execute `{command}`: {source}")]
    ProcessExecution {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool output reported a failure: {0}")]
    LogDetectedFailure(String),

    #[error(
        "Size of source and target do not match for {path}: source = {source_bytes} bytes, target = {target_bytes} bytes"
    )]
    SizeMismatch {
        path: String,
        source_bytes: u64,
        target_bytes: u64,
    },

    #[error("Could not calculate size of {path}: {reason}")]
    SizeComputation { path: String, reason: String },

    #[error("Cleanup of {location} failed: {reason}")]
    CleanupFailed { location: String, reason: String },

    #[error("Retry exhausted: {0}")]
    RetryExhausted(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Filesystem error: {0}")]
    FileSystem(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DesError {
    /// Whether this error is the external cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DesError::Cancelled)
    }
}

/// The only failure that escapes a transfer or export entry point.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation cancelled")]
pub struct Cancelled;

impl From<Cancelled> for DesError {
    fn from(_: Cancelled) -> Self {
        DesError::Cancelled
    }
}
