//! Core domain errors.

use thiserror::Error;

/// Core domain errors for AgentOps.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown event type name.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Event belongs to a different run than the one being reconstructed.
    #[error("Event for run '{found}' does not belong to run '{expected}'")]
    ForeignEvent { expected: String, found: String },

    /// The run's event sequence breaks the started/terminal ordering rules.
    #[error("Invalid event sequence for run '{run_id}': {reason}")]
    InvalidSequence { run_id: String, reason: String },
}
