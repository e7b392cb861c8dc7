//! AgentOps Event Log
//!
//! An append-only, totally ordered log of run events with:
//! - independent cursor reads (`read_from`) that block up to a timeout
//! - consumer groups with exclusive pending delivery, acknowledgement
//!   and redelivery of stale claims
//! - optional JSON-lines journaling so the log survives restarts

pub mod error;
mod group;
mod journal;
pub mod log;
pub mod memory;

pub use error::LogError;
pub use group::PendingSummary;
pub use log::{Delivery, EventLog};
pub use memory::MemoryEventLog;
