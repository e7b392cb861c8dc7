//! Run reconstruction from log entries.
//!
//! A run has no stored representation of its own; everything here is derived
//! by scanning entries for one run id in position order.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::event::{EventType, LogEntry};
use crate::ids::RunId;

/// Status of a run as seen in the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Started, no terminal event yet.
    #[default]
    Active,
    /// RUN_COMPLETED seen.
    Completed,
    /// RUN_FAILED seen.
    Failed,
}

impl RunStatus {
    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of a run reconstructed from the log.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Goal from the RUN_STARTED event.
    pub goal: Option<String>,
    /// Body of the FINAL_OUTPUT event, if produced.
    pub output: Option<String>,
    /// Matching entries up to and including the first terminal one.
    pub events: Vec<LogEntry>,
}

impl RunSummary {
    /// Rebuild a run from log entries.
    ///
    /// Entries for other runs are skipped. Anything after the first terminal
    /// event is ignored, the same way a tailing observer stops there, so
    /// duplicates from redelivery do not change the snapshot. Returns `None`
    /// when the run has no entries at all.
    pub fn from_entries<'a>(
        run_id: &RunId,
        entries: impl IntoIterator<Item = &'a LogEntry>,
    ) -> Option<Self> {
        let mut summary = RunSummary {
            run_id: run_id.clone(),
            status: RunStatus::Active,
            goal: None,
            output: None,
            events: Vec::new(),
        };

        for entry in entries {
            if &entry.event.run_id != run_id {
                continue;
            }

            match entry.event.event_type {
                EventType::RunStarted => {
                    if summary.goal.is_none() {
                        summary.goal = Some(entry.event.message.clone());
                    }
                }
                EventType::Step | EventType::ToolCalled => {}
                EventType::FinalOutput => {
                    if summary.output.is_none() {
                        summary.output = Some(entry.event.message.clone());
                    }
                }
                EventType::RunCompleted => summary.status = RunStatus::Completed,
                EventType::RunFailed => summary.status = RunStatus::Failed,
            }

            summary.events.push(entry.clone());
            if summary.status.is_terminal() {
                break;
            }
        }

        if summary.events.is_empty() {
            None
        } else {
            Some(summary)
        }
    }
}

/// Check the lifecycle rules for one run's entries.
///
/// Exactly one RUN_STARTED, which comes first; at most one terminal event;
/// nothing after the terminal event; positions strictly increasing.
pub fn check_sequence<'a>(
    run_id: &RunId,
    entries: impl IntoIterator<Item = &'a LogEntry>,
) -> Result<(), CoreError> {
    let invalid = |reason: String| CoreError::InvalidSequence {
        run_id: run_id.to_string(),
        reason,
    };

    let mut started = false;
    let mut terminated = false;
    let mut last_position = None;

    for entry in entries {
        if &entry.event.run_id != run_id {
            return Err(CoreError::ForeignEvent {
                expected: run_id.to_string(),
                found: entry.event.run_id.to_string(),
            });
        }
        if let Some(last) = last_position {
            if entry.position <= last {
                return Err(invalid(format!(
                    "position {} does not follow {}",
                    entry.position, last
                )));
            }
        }
        last_position = Some(entry.position);

        if terminated {
            return Err(invalid(format!(
                "{} at {} after terminal event",
                entry.event.event_type, entry.position
            )));
        }

        match entry.event.event_type {
            EventType::RunStarted if started => {
                return Err(invalid(format!("duplicate RUN_STARTED at {}", entry.position)));
            }
            EventType::RunStarted => started = true,
            other if !started => {
                return Err(invalid(format!("{} at {} before RUN_STARTED", other, entry.position)));
            }
            EventType::Step | EventType::ToolCalled | EventType::FinalOutput => {}
            EventType::RunCompleted | EventType::RunFailed => terminated = true,
        }
    }

    if !started {
        return Err(invalid("missing RUN_STARTED".to_string()));
    }
    Ok(())
}
