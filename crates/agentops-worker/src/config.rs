//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer group shared by all workers.
    pub group: String,

    /// Prefix for consumer names; members are named `{prefix}-{n}`.
    pub consumer_prefix: String,

    /// Maximum entries claimed per read.
    pub batch_size: usize,

    /// How long a group read blocks before returning empty.
    pub block_timeout: Duration,

    /// Simulated work between steps.
    pub step_delay: Duration,

    /// Deliveries of one entry before the run is marked failed.
    pub max_deliveries: u32,

    /// Pause after a failed read or emission.
    pub retry_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            group: "workers".to_string(),
            consumer_prefix: "worker".to_string(),
            batch_size: 10,
            block_timeout: Duration::from_secs(5),
            step_delay: Duration::from_millis(500),
            max_deliveries: 5,
            retry_backoff: Duration::from_secs(1),
        }
    }
}
