//! AgentOps Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Log storage
//! - Runtime specifics
//!
//! All types here describe runs and the events they leave in the log.

pub mod error;
pub mod event;
pub mod ids;
pub mod respond;
pub mod run;

// Re-export commonly used types
pub use error::CoreError;
pub use event::{EventType, LogEntry, RunEvent};
pub use ids::{LogPosition, RunId};
pub use respond::generate_response;
pub use run::{RunStatus, RunSummary};
