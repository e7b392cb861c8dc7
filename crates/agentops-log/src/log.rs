//! The event log contract.

use std::time::Duration;

use async_trait::async_trait;

use agentops_core::{LogEntry, LogPosition, RunEvent};

use crate::error::LogError;
use crate::group::PendingSummary;

/// An entry handed to a consumer group member.
///
/// The entry's position doubles as the delivery id passed to
/// [`EventLog::ack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub entry: LogEntry,
    /// Consumer that currently owns the entry.
    pub consumer: String,
    /// How many times the entry has been handed out, this delivery included.
    pub delivery_count: u32,
}

impl Delivery {
    /// Delivery id used for acknowledgement.
    pub fn id(&self) -> LogPosition {
        self.entry.position
    }
}

/// Append-only, totally ordered event log shared by producers, workers and
/// tails.
///
/// Blocking reads wait at most `block` for new entries and return an empty
/// batch when nothing arrived, so callers can emit heartbeats or check for
/// shutdown between polls.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event and return the position assigned to it.
    async fn append(&self, event: RunEvent) -> Result<LogPosition, LogError>;

    /// Read up to `max_count` entries positioned after `cursor`.
    async fn read_from(
        &self,
        cursor: LogPosition,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, LogError>;

    /// Create a consumer group that delivers entries after `start`.
    ///
    /// Returns `false` if the group already existed; that is not an error.
    async fn create_group(&self, group: &str, start: LogPosition) -> Result<bool, LogError>;

    /// Claim up to `max_count` entries for `consumer`.
    ///
    /// Stale pending entries (claimed longer ago than the log's claim timeout
    /// and never acknowledged) are reclaimed first, least recently delivered
    /// first; then never-delivered entries follow in position order.
    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, LogError>;

    /// Restart the claim timer of a delivery `consumer` still owns.
    ///
    /// Returns `false` when the entry is no longer pending or has been
    /// reclaimed by another consumer; the caller must then stop working on it.
    async fn renew(
        &self,
        group: &str,
        consumer: &str,
        id: LogPosition,
    ) -> Result<bool, LogError>;

    /// Mark a delivery as processed. Returns `false` if it was not pending.
    async fn ack(&self, group: &str, id: LogPosition) -> Result<bool, LogError>;

    /// Summary of a group's pending entries.
    async fn pending(&self, group: &str) -> Result<PendingSummary, LogError>;

    /// Number of entries in the log.
    async fn entry_count(&self) -> Result<u64, LogError>;

    /// Names of all consumer groups.
    async fn groups(&self) -> Result<Vec<String>, LogError>;
}
