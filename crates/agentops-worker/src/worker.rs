//! A single consumer group member.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use agentops_core::{EventType, LogPosition, RunEvent, RunId};
use agentops_log::{Delivery, EventLog, LogError};

use crate::config::WorkerConfig;
use crate::schedule::StepSchedule;

/// Errors that can occur while a worker processes deliveries.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Event log error: {0}")]
    Log(#[from] LogError),

    #[error("Invalid step schedule: {0}")]
    InvalidSchedule(String),
}

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The run's full sequence was emitted.
    Completed(RunId),
    /// Delivered too many times; a RUN_FAILED was emitted instead.
    DeadLettered(RunId),
    /// Nothing to do (not a start event, or the run already finished);
    /// acknowledged without action.
    Skipped(LogPosition),
    /// Another consumer took the entry over; left unacknowledged for it.
    Reclaimed(LogPosition),
}

/// A named member of the worker consumer group.
pub struct Worker {
    log: Arc<dyn EventLog>,
    config: Arc<WorkerConfig>,
    schedule: Arc<StepSchedule>,
    consumer: String,
}

impl Worker {
    /// Create a new Worker.
    pub fn new(
        log: Arc<dyn EventLog>,
        config: Arc<WorkerConfig>,
        schedule: Arc<StepSchedule>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            log,
            config,
            schedule,
            consumer: consumer.into(),
        }
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Make sure the consumer group exists.
    pub async fn ensure_group(&self) -> Result<(), WorkerError> {
        let created = self
            .log
            .create_group(&self.config.group, LogPosition::GENESIS)
            .await?;
        if created {
            info!(group = %self.config.group, "Created consumer group");
        }
        Ok(())
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// Cancellation interrupts a blocked read or a backoff pause, never a
    /// run in progress.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            consumer = %self.consumer,
            group = %self.config.group,
            "Worker running, waiting for RUN_STARTED events"
        );

        while let Err(e) = self.ensure_group().await {
            warn!(consumer = %self.consumer, error = %e, "Failed to create consumer group");
            if self.pause(&shutdown).await {
                return;
            }
        }

        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break,
                batch = self.read_batch() => batch,
            };

            let result = match batch {
                Ok(deliveries) => self.process(deliveries).await.map(|_| ()),
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                // Whatever was not acknowledged stays pending and comes back.
                warn!(consumer = %self.consumer, error = %e, "Worker iteration failed");
                if self.pause(&shutdown).await {
                    break;
                }
            }
        }

        info!(consumer = %self.consumer, "Worker stopped");
    }

    /// One iteration: claim a batch and handle it.
    pub async fn poll_once(&self) -> Result<Vec<Outcome>, WorkerError> {
        let deliveries = self.read_batch().await?;
        self.process(deliveries).await
    }

    async fn read_batch(&self) -> Result<Vec<Delivery>, WorkerError> {
        let deliveries = self
            .log
            .read_group(
                &self.config.group,
                &self.consumer,
                self.config.batch_size,
                self.config.block_timeout,
            )
            .await?;
        Ok(deliveries)
    }

    /// Handle deliveries in order, stopping at the first failure.
    ///
    /// An entry is acknowledged only while this worker still holds its claim.
    async fn process(&self, deliveries: Vec<Delivery>) -> Result<Vec<Outcome>, WorkerError> {
        let mut outcomes = Vec::with_capacity(deliveries.len());
        for delivery in &deliveries {
            let outcome = self.handle(delivery).await?;
            let held = match outcome {
                Outcome::Reclaimed(_) => false,
                _ => self.renew(delivery).await?,
            };

            if held {
                if !self.log.ack(&self.config.group, delivery.id()).await? {
                    warn!(
                        consumer = %self.consumer,
                        position = %delivery.id(),
                        "Acknowledged entry was not pending"
                    );
                }
                outcomes.push(outcome);
            } else {
                outcomes.push(Outcome::Reclaimed(delivery.id()));
            }
        }
        Ok(outcomes)
    }

    async fn handle(&self, delivery: &Delivery) -> Result<Outcome, WorkerError> {
        let event = &delivery.entry.event;

        match event.event_type {
            EventType::RunStarted => {}
            EventType::Step
            | EventType::ToolCalled
            | EventType::FinalOutput
            | EventType::RunCompleted
            | EventType::RunFailed => {
                trace!(
                    consumer = %self.consumer,
                    position = %delivery.id(),
                    event_type = %event.event_type,
                    "Skipping non-start event"
                );
                return Ok(Outcome::Skipped(delivery.id()));
            }
        }

        // Entries queued behind a long run may have been taken over already.
        if !self.renew(delivery).await? {
            return Ok(Outcome::Reclaimed(delivery.id()));
        }

        let run_id = event.run_id.clone();
        if delivery.delivery_count > 1 && self.run_finished(&run_id).await? {
            info!(
                consumer = %self.consumer,
                run_id = %run_id,
                delivery_count = delivery.delivery_count,
                "Run already finished, acknowledging redelivery"
            );
            return Ok(Outcome::Skipped(delivery.id()));
        }

        if delivery.delivery_count > self.config.max_deliveries {
            warn!(
                consumer = %self.consumer,
                run_id = %run_id,
                deliveries = delivery.delivery_count,
                "Giving up on run"
            );
            self.log
                .append(RunEvent::run_failed(
                    run_id.clone(),
                    format!(
                        "Run failed after {} delivery attempts",
                        delivery.delivery_count - 1
                    ),
                ))
                .await?;
            return Ok(Outcome::DeadLettered(run_id));
        }

        if delivery.delivery_count > 1 {
            info!(
                consumer = %self.consumer,
                run_id = %run_id,
                delivery_count = delivery.delivery_count,
                "Re-executing redelivered run from the start"
            );
        } else {
            info!(consumer = %self.consumer, run_id = %run_id, "Executing run");
        }

        for planned in self.schedule.plan(&run_id, &event.message) {
            if !self.renew(delivery).await? {
                warn!(
                    consumer = %self.consumer,
                    run_id = %run_id,
                    "Claim lost mid-run, leaving the run to its new owner"
                );
                return Ok(Outcome::Reclaimed(delivery.id()));
            }
            let position = self.log.append(planned.event).await?;
            debug!(run_id = %run_id, position = %position, "Emitted run event");
            if !planned.delay.is_zero() {
                tokio::time::sleep(planned.delay).await;
            }
        }

        info!(consumer = %self.consumer, run_id = %run_id, "Run completed");
        Ok(Outcome::Completed(run_id))
    }

    /// Restart the claim timer; `false` once another consumer owns the entry.
    async fn renew(&self, delivery: &Delivery) -> Result<bool, WorkerError> {
        let held = self
            .log
            .renew(&self.config.group, &self.consumer, delivery.id())
            .await?;
        Ok(held)
    }

    /// Whether the log already holds a terminal event for `run_id`.
    async fn run_finished(&self, run_id: &RunId) -> Result<bool, WorkerError> {
        let entries = self
            .log
            .read_from(LogPosition::GENESIS, usize::MAX, Duration::ZERO)
            .await?;
        Ok(entries
            .iter()
            .any(|entry| &entry.event.run_id == run_id && entry.event.is_terminal()))
    }

    /// Sleep for the retry backoff. Returns true if shutdown was requested.
    async fn pause(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => true,
            _ = tokio::time::sleep(self.config.retry_backoff) => false,
        }
    }
}
