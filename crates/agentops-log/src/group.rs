//! Consumer group bookkeeping.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use agentops_core::{LogEntry, LogPosition};

use crate::log::Delivery;

/// An entry handed out but not yet acknowledged.
#[derive(Debug, Clone)]
struct PendingEntry {
    consumer: String,
    delivered_at: Instant,
    delivery_count: u32,
}

/// Summary of a consumer group's pending entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingSummary {
    /// Total pending entries.
    pub count: usize,
    /// Lowest pending position.
    pub lowest: Option<LogPosition>,
    /// Highest pending position.
    pub highest: Option<LogPosition>,
    /// Pending entries per consumer.
    pub consumers: BTreeMap<String, usize>,
}

/// State of one consumer group.
#[derive(Debug)]
pub(crate) struct ConsumerGroup {
    /// Highest position ever handed out to this group.
    last_delivered: LogPosition,
    pending: BTreeMap<LogPosition, PendingEntry>,
    /// Positions past `last_delivered` known to be acknowledged already.
    /// Only populated when a group is restored from a journal.
    acked_ahead: BTreeSet<LogPosition>,
}

impl ConsumerGroup {
    pub(crate) fn new(start: LogPosition) -> Self {
        Self {
            last_delivered: start,
            pending: BTreeMap::new(),
            acked_ahead: BTreeSet::new(),
        }
    }

    /// Record an acknowledgement replayed from the journal.
    pub(crate) fn restore_ack(&mut self, position: LogPosition) {
        if position > self.last_delivered {
            self.acked_ahead.insert(position);
        }
    }

    /// Claim up to `max_count` entries for `consumer`.
    ///
    /// `entries[i]` must hold position `i + 1`.
    pub(crate) fn claim(
        &mut self,
        entries: &[LogEntry],
        consumer: &str,
        max_count: usize,
        claim_timeout: Duration,
        now: Instant,
    ) -> Vec<Delivery> {
        let mut deliveries = Vec::new();

        // Stale claims first, least recently delivered first.
        let mut stale: Vec<(LogPosition, Instant)> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.delivered_at) >= claim_timeout)
            .map(|(pos, p)| (*pos, p.delivered_at))
            .collect();
        stale.sort_by_key(|(pos, delivered_at)| (*delivered_at, *pos));

        for (position, _) in stale.into_iter().take(max_count) {
            let Some(entry) = entry_at(entries, position) else {
                continue;
            };
            if let Some(pending) = self.pending.get_mut(&position) {
                pending.consumer = consumer.to_string();
                pending.delivered_at = now;
                pending.delivery_count += 1;
                deliveries.push(Delivery {
                    entry: entry.clone(),
                    consumer: consumer.to_string(),
                    delivery_count: pending.delivery_count,
                });
            }
        }

        // Then entries this group has never seen.
        while deliveries.len() < max_count {
            let position = self.last_delivered.next();
            let Some(entry) = entry_at(entries, position) else {
                break;
            };
            self.last_delivered = position;
            if self.acked_ahead.remove(&position) {
                continue;
            }

            self.pending.insert(
                position,
                PendingEntry {
                    consumer: consumer.to_string(),
                    delivered_at: now,
                    delivery_count: 1,
                },
            );
            deliveries.push(Delivery {
                entry: entry.clone(),
                consumer: consumer.to_string(),
                delivery_count: 1,
            });
        }

        deliveries
    }

    pub(crate) fn is_pending(&self, position: LogPosition) -> bool {
        self.pending.contains_key(&position)
    }

    /// Restart the claim timer if `consumer` still owns `position`.
    pub(crate) fn renew(&mut self, position: LogPosition, consumer: &str, now: Instant) -> bool {
        match self.pending.get_mut(&position) {
            Some(pending) if pending.consumer == consumer => {
                pending.delivered_at = now;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn ack(&mut self, position: LogPosition) -> bool {
        self.pending.remove(&position).is_some()
    }

    /// When the oldest pending claim becomes reclaimable.
    pub(crate) fn next_reclaim_at(&self, claim_timeout: Duration) -> Option<Instant> {
        self.pending
            .values()
            .map(|p| p.delivered_at + claim_timeout)
            .min()
    }

    pub(crate) fn summary(&self) -> PendingSummary {
        let mut consumers = BTreeMap::new();
        for pending in self.pending.values() {
            *consumers.entry(pending.consumer.clone()).or_insert(0) += 1;
        }

        PendingSummary {
            count: self.pending.len(),
            lowest: self.pending.keys().next().copied(),
            highest: self.pending.keys().next_back().copied(),
            consumers,
        }
    }
}

fn entry_at(entries: &[LogEntry], position: LogPosition) -> Option<&LogEntry> {
    let index = usize::try_from(position.value()).ok()?.checked_sub(1)?;
    entries.get(index)
}
