//! Event log errors.

use thiserror::Error;

/// Errors returned by event log operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log's storage cannot be reached.
    #[error("Event log unavailable: {0}")]
    Unavailable(String),

    /// Journal file I/O failed.
    #[error("Journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A journal record could not be encoded or decoded.
    #[error("Journal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The journal contents are inconsistent.
    #[error("Corrupt journal at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    /// Consumer group has not been created.
    #[error("Consumer group not found: {0}")]
    GroupNotFound(String),
}

impl LogError {
    /// Returns true for infrastructure failures a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}
