//! Run submission.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use agentops_core::{RunEvent, RunId};
use agentops_log::{EventLog, LogError};

/// Errors returned when submitting a run.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Goal must not be empty")]
    EmptyGoal,

    #[error("Failed to record run: {0}")]
    Log(#[from] LogError),
}

/// Creates runs by appending their start event.
#[derive(Clone)]
pub struct Producer {
    log: Arc<dyn EventLog>,
}

impl Producer {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self { log }
    }

    /// Start a run for `goal` and return its id without waiting for it.
    pub async fn submit(&self, goal: &str) -> Result<RunId, SubmitError> {
        if goal.trim().is_empty() {
            return Err(SubmitError::EmptyGoal);
        }

        let run_id = RunId::generate();
        match self.log.append(RunEvent::run_started(run_id.clone(), goal)).await {
            Ok(position) => {
                info!(run_id = %run_id, position = %position, "Run submitted");
                Ok(run_id)
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Failed to submit run");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use agentops_core::{EventType, LogPosition};
    use agentops_log::MemoryEventLog;

    #[tokio::test]
    async fn test_submit_appends_single_start_event() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let producer = Producer::new(log.clone());

        let run_id = producer.submit("refund my order").await.unwrap();

        let entries = log
            .read_from(LogPosition::GENESIS, 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event.run_id, run_id);
        assert_eq!(entries[0].event.event_type, EventType::RunStarted);
        assert_eq!(entries[0].event.message, "refund my order");
    }

    #[tokio::test]
    async fn test_submit_generates_fresh_ids() {
        let producer = Producer::new(Arc::new(MemoryEventLog::new()));
        let a = producer.submit("hello").await.unwrap();
        let b = producer.submit("hello").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_empty_goal_is_rejected() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let producer = Producer::new(log.clone());

        let err = producer.submit("   ").await.unwrap_err();
        assert!(matches!(err, SubmitError::EmptyGoal));
        assert_eq!(log.entry_count().await.unwrap(), 0);
    }
}
