//! AgentOps Server Library
//!
//! Run submission, per-run live tails over the shared event log, and the
//! HTTP surface that exposes both.

pub mod config;
pub mod http;
pub mod metrics;
pub mod producer;
pub mod state;
pub mod tail;

pub use config::{Config, ConfigError};
pub use producer::{Producer, SubmitError};
pub use state::AppState;
pub use tail::{RunTail, TailConfig, TailItem};
