//! Run events as they are stored in the log.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{LogPosition, RunId};

/// Type of run event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Run submitted; the message carries the goal.
    RunStarted,
    /// Progress description.
    Step,
    /// A tool was invoked.
    ToolCalled,
    /// The final result body.
    FinalOutput,
    /// Run finished successfully.
    RunCompleted,
    /// Run gave up.
    RunFailed,
}

impl EventType {
    /// Every event type, in lifecycle order.
    pub const ALL: [EventType; 6] = [
        EventType::RunStarted,
        EventType::Step,
        EventType::ToolCalled,
        EventType::FinalOutput,
        EventType::RunCompleted,
        EventType::RunFailed,
    ];

    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStarted => "RUN_STARTED",
            Self::Step => "STEP",
            Self::ToolCalled => "TOOL_CALLED",
            Self::FinalOutput => "FINAL_OUTPUT",
            Self::RunCompleted => "RUN_COMPLETED",
            Self::RunFailed => "RUN_FAILED",
        }
    }

    /// Returns true if the event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted | Self::RunFailed)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownEventType(s.to_string()))
    }
}

/// An immutable event record.
///
/// Serializes as the flat field mapping the log stores:
/// `{"run_id": .., "type": .., "message": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Run this event belongs to.
    pub run_id: RunId,
    /// Type of event.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Goal text, progress description, or result body depending on type.
    pub message: String,
}

impl RunEvent {
    /// Create a new run event.
    pub fn new(run_id: RunId, event_type: EventType, message: impl Into<String>) -> Self {
        Self {
            run_id,
            event_type,
            message: message.into(),
        }
    }

    /// Create a RunStarted event carrying the goal.
    pub fn run_started(run_id: RunId, goal: impl Into<String>) -> Self {
        Self::new(run_id, EventType::RunStarted, goal)
    }

    /// Create a FinalOutput event carrying the result body.
    pub fn final_output(run_id: RunId, output: impl Into<String>) -> Self {
        Self::new(run_id, EventType::FinalOutput, output)
    }

    /// Create a RunCompleted event.
    pub fn run_completed(run_id: RunId) -> Self {
        Self::new(run_id, EventType::RunCompleted, "Run completed successfully")
    }

    /// Create a RunFailed event with a reason.
    pub fn run_failed(run_id: RunId, reason: impl Into<String>) -> Self {
        Self::new(run_id, EventType::RunFailed, reason)
    }

    /// Returns true if this event ends its run.
    pub fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }
}

/// An event together with the position the log assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub position: LogPosition,
    pub event: RunEvent,
}

impl LogEntry {
    pub fn new(position: LogPosition, event: RunEvent) -> Self {
        Self { position, event }
    }
}
