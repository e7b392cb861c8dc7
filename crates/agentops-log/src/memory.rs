//! In-process event log.
//!
//! All state lives behind one async mutex: appends are serialized, which is
//! what makes position assignment atomic. Readers waiting for new entries
//! park on a [`Notify`] that every append wakes.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use agentops_core::{LogEntry, LogPosition, RunEvent};

use crate::error::LogError;
use crate::group::{ConsumerGroup, PendingSummary};
use crate::journal::{Journal, JournalRecord};
use crate::log::{Delivery, EventLog};

/// Default time a delivery may stay unacknowledged before another consumer
/// can reclaim it.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct LogState {
    /// `entries[i]` holds position `i + 1`.
    entries: Vec<LogEntry>,
    groups: HashMap<String, ConsumerGroup>,
    journal: Option<Journal>,
}

impl LogState {
    fn next_position(&self) -> LogPosition {
        LogPosition::new(self.entries.len() as u64 + 1)
    }

    fn record(&mut self, record: &JournalRecord) -> Result<(), LogError> {
        match self.journal.as_mut() {
            Some(journal) => journal.write(record),
            None => Ok(()),
        }
    }

    /// Apply a record read back from the journal.
    fn replay(&mut self, line: usize, record: JournalRecord) -> Result<(), LogError> {
        match record {
            JournalRecord::Append { position, event } => {
                let expected = self.next_position();
                if position != expected {
                    return Err(LogError::Corrupt {
                        line,
                        message: format!("expected position {expected}, found {position}"),
                    });
                }
                self.entries.push(LogEntry::new(position, event));
            }
            JournalRecord::CreateGroup { group, start } => {
                self.groups
                    .entry(group)
                    .or_insert_with(|| ConsumerGroup::new(start));
            }
            JournalRecord::Ack { group, position } => {
                let state = self.groups.get_mut(&group).ok_or_else(|| LogError::Corrupt {
                    line,
                    message: format!("ack for unknown group '{group}'"),
                })?;
                state.restore_ack(position);
            }
        }
        Ok(())
    }
}

/// Event log held in memory, optionally journaled to disk.
pub struct MemoryEventLog {
    state: Mutex<LogState>,
    appended: Notify,
    claim_timeout: Duration,
}

impl MemoryEventLog {
    /// Create an empty, non-durable log.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            appended: Notify::new(),
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }

    /// Open a log journaled at `path`, restoring whatever it already holds.
    ///
    /// Restored groups have no pending entries: anything not acknowledged
    /// before the restart is delivered again.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let (journal, records) = Journal::open(path.as_ref())?;

        let mut state = LogState::default();
        for (index, record) in records.into_iter().enumerate() {
            state.replay(index + 1, record)?;
        }

        info!(
            path = %path.as_ref().display(),
            entries = state.entries.len(),
            groups = state.groups.len(),
            "Event log restored from journal"
        );

        state.journal = Some(journal);
        Ok(Self {
            state: Mutex::new(state),
            appended: Notify::new(),
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        })
    }

    /// Set how long a delivery may stay unacknowledged before it is reclaimed.
    pub fn with_claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.claim_timeout = claim_timeout;
        self
    }

    pub fn claim_timeout(&self) -> Duration {
        self.claim_timeout
    }

    /// Run `attempt` until it yields something or `block` elapses.
    ///
    /// `attempt` may return a hint for when a retry could succeed without a
    /// new append (a pending claim going stale).
    async fn blocking<T, F>(&self, block: Duration, mut attempt: F) -> Result<Vec<T>, LogError>
    where
        T: Send,
        F: FnMut(&mut LogState, Instant) -> Result<(Vec<T>, Option<Instant>), LogError> + Send,
    {
        let deadline = Instant::now() + block;

        loop {
            // Register before looking so an append in between is not missed.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            let (batch, retry_at) = {
                let mut state = self.state.lock().await;
                attempt(&mut *state, now)?
            };

            if !batch.is_empty() || now >= deadline {
                return Ok(batch);
            }

            let wake_at = retry_at.map_or(deadline, |at| at.max(now).min(deadline));
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, event: RunEvent) -> Result<LogPosition, LogError> {
        let mut state = self.state.lock().await;
        let position = state.next_position();

        state.record(&JournalRecord::Append {
            position,
            event: event.clone(),
        })?;

        debug!(
            position = %position,
            run_id = %event.run_id,
            event_type = %event.event_type,
            "Event appended"
        );
        state.entries.push(LogEntry::new(position, event));
        drop(state);

        self.appended.notify_waiters();
        Ok(position)
    }

    async fn read_from(
        &self,
        cursor: LogPosition,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, LogError> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        self.blocking(block, |state, _now| {
            let start = usize::try_from(cursor.value()).unwrap_or(usize::MAX);
            let batch = state
                .entries
                .get(start..)
                .unwrap_or_default()
                .iter()
                .take(max_count)
                .cloned()
                .collect();
            Ok((batch, None))
        })
        .await
    }

    async fn create_group(&self, group: &str, start: LogPosition) -> Result<bool, LogError> {
        let mut state = self.state.lock().await;
        if state.groups.contains_key(group) {
            debug!(group = %group, "Consumer group already exists");
            return Ok(false);
        }

        state.record(&JournalRecord::CreateGroup {
            group: group.to_string(),
            start,
        })?;
        state
            .groups
            .insert(group.to_string(), ConsumerGroup::new(start));

        info!(group = %group, start = %start, "Consumer group created");
        Ok(true)
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, LogError> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let claim_timeout = self.claim_timeout;
        self.blocking(block, |state, now| {
            let LogState {
                entries, groups, ..
            } = state;
            let members = groups
                .get_mut(group)
                .ok_or_else(|| LogError::GroupNotFound(group.to_string()))?;

            let deliveries = members.claim(entries, consumer, max_count, claim_timeout, now);
            for delivery in &deliveries {
                trace!(
                    group = %group,
                    consumer = %consumer,
                    position = %delivery.id(),
                    delivery_count = delivery.delivery_count,
                    "Entry delivered"
                );
            }

            Ok((deliveries, members.next_reclaim_at(claim_timeout)))
        })
        .await
    }

    async fn renew(
        &self,
        group: &str,
        consumer: &str,
        id: LogPosition,
    ) -> Result<bool, LogError> {
        let mut state = self.state.lock().await;
        let renewed = state
            .groups
            .get_mut(group)
            .ok_or_else(|| LogError::GroupNotFound(group.to_string()))?
            .renew(id, consumer, Instant::now());
        if !renewed {
            debug!(group = %group, consumer = %consumer, position = %id, "Claim no longer held");
        }
        Ok(renewed)
    }

    async fn ack(&self, group: &str, id: LogPosition) -> Result<bool, LogError> {
        let mut state = self.state.lock().await;
        let is_pending = state
            .groups
            .get(group)
            .ok_or_else(|| LogError::GroupNotFound(group.to_string()))?
            .is_pending(id);
        if !is_pending {
            return Ok(false);
        }

        state.record(&JournalRecord::Ack {
            group: group.to_string(),
            position: id,
        })?;

        let acked = state
            .groups
            .get_mut(group)
            .map(|members| members.ack(id))
            .unwrap_or(false);
        trace!(group = %group, position = %id, "Entry acknowledged");
        Ok(acked)
    }

    async fn pending(&self, group: &str) -> Result<PendingSummary, LogError> {
        let state = self.state.lock().await;
        state
            .groups
            .get(group)
            .map(ConsumerGroup::summary)
            .ok_or_else(|| LogError::GroupNotFound(group.to_string()))
    }

    async fn entry_count(&self) -> Result<u64, LogError> {
        Ok(self.state.lock().await.entries.len() as u64)
    }

    async fn groups(&self) -> Result<Vec<String>, LogError> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = state.groups.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
