//! A set of workers sharing one consumer group.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use agentops_log::EventLog;

use crate::config::WorkerConfig;
use crate::schedule::StepSchedule;
use crate::worker::Worker;

/// Running workers and the token that stops them.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn `size` workers named `{prefix}-1` .. `{prefix}-{size}`.
    pub fn spawn(
        log: Arc<dyn EventLog>,
        config: WorkerConfig,
        schedule: StepSchedule,
        size: usize,
    ) -> Self {
        let config = Arc::new(config);
        let schedule = Arc::new(schedule);
        let shutdown = CancellationToken::new();

        let handles = (1..=size)
            .map(|n| {
                let consumer = format!("{}-{}", config.consumer_prefix, n);
                let worker = Worker::new(log.clone(), config.clone(), schedule.clone(), consumer);
                let shutdown = shutdown.child_token();
                tokio::spawn(async move { worker.run(shutdown).await })
            })
            .collect();

        info!(size, group = %config.group, "Worker pool started");
        Self { handles, shutdown }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Token that stops every worker when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop all workers and wait for in-flight runs to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task panicked");
            }
        }
        info!("Worker pool stopped");
    }
}
