//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use agentops_log::EventLog;

use crate::producer::Producer;
use crate::tail::TailConfig;

/// Shared application state.
pub struct AppState {
    /// The shared event log.
    pub log: Arc<dyn EventLog>,

    /// Run submission.
    pub producer: Producer,

    /// Settings for every tail the server opens.
    pub tail: TailConfig,

    /// Cancelled on shutdown; open tails close when it fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(log: Arc<dyn EventLog>, tail: TailConfig) -> Arc<Self> {
        Arc::new(Self {
            producer: Producer::new(log.clone()),
            log,
            tail,
            shutdown: CancellationToken::new(),
        })
    }
}
