//! Step schedule for a run.
//!
//! The schedule is data: an ordered list of progress events, each followed by
//! a delay standing in for real work. Planning a run turns it into the exact
//! events a worker will append, which keeps the sequence testable without a
//! log or a clock.

use std::time::Duration;

use agentops_core::{generate_response, EventType, RunEvent, RunId};

use crate::worker::WorkerError;

/// One progress step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub event_type: EventType,
    pub message: String,
    /// Pause after the step is emitted.
    pub delay: Duration,
}

impl Step {
    pub fn new(event_type: EventType, message: impl Into<String>, delay: Duration) -> Self {
        Self {
            event_type,
            message: message.into(),
            delay,
        }
    }
}

/// An event to append, and how long to wait afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEvent {
    pub event: RunEvent,
    pub delay: Duration,
}

/// Ordered progress steps executed for every run.
#[derive(Debug, Clone)]
pub struct StepSchedule {
    steps: Vec<Step>,
}

impl StepSchedule {
    /// Build a schedule from progress steps.
    ///
    /// Only `STEP` and `TOOL_CALLED` may appear; the start, final output and
    /// terminal events are placed by the worker itself.
    pub fn new(steps: Vec<Step>) -> Result<Self, WorkerError> {
        for step in &steps {
            match step.event_type {
                EventType::Step | EventType::ToolCalled => {}
                EventType::RunStarted
                | EventType::FinalOutput
                | EventType::RunCompleted
                | EventType::RunFailed => {
                    return Err(WorkerError::InvalidSchedule(format!(
                        "{} cannot be a scheduled step",
                        step.event_type
                    )));
                }
            }
        }
        Ok(Self { steps })
    }

    /// Analyze, call the knowledge-base tool, synthesize.
    pub fn standard(delay: Duration) -> Self {
        Self {
            steps: vec![
                Step::new(EventType::Step, "Analyzing goal", delay),
                Step::new(EventType::ToolCalled, "Calling tool: search_kb", delay),
                Step::new(EventType::Step, "Synthesizing response", delay),
            ],
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Every event a run with this goal produces after its start, in order.
    pub fn plan(&self, run_id: &RunId, goal: &str) -> Vec<PlannedEvent> {
        let mut planned: Vec<PlannedEvent> = self
            .steps
            .iter()
            .map(|step| PlannedEvent {
                event: RunEvent::new(run_id.clone(), step.event_type, step.message.clone()),
                delay: step.delay,
            })
            .collect();

        planned.push(PlannedEvent {
            event: RunEvent::final_output(run_id.clone(), generate_response(goal)),
            delay: Duration::ZERO,
        });
        planned.push(PlannedEvent {
            event: RunEvent::run_completed(run_id.clone()),
            delay: Duration::ZERO,
        });
        planned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_plan_order() {
        let schedule = StepSchedule::standard(Duration::from_millis(500));
        let run_id = RunId::new("r-1");
        let plan = schedule.plan(&run_id, "refund my order");

        let types: Vec<EventType> = plan.iter().map(|p| p.event.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::Step,
                EventType::ToolCalled,
                EventType::Step,
                EventType::FinalOutput,
                EventType::RunCompleted,
            ]
        );
        assert!(plan.iter().all(|p| p.event.run_id == run_id));
        assert_eq!(plan[1].event.message, "Calling tool: search_kb");
        assert_eq!(plan[0].delay, Duration::from_millis(500));
        assert_eq!(plan[4].delay, Duration::ZERO);
        assert!(plan[3].event.message.contains("Refund Approved"));
    }

    #[test]
    fn test_rejects_lifecycle_steps() {
        let result = StepSchedule::new(vec![Step::new(
            EventType::RunCompleted,
            "done early",
            Duration::ZERO,
        )]);
        assert!(matches!(result, Err(WorkerError::InvalidSchedule(_))));
    }

    #[test]
    fn test_empty_schedule_still_finishes() {
        let schedule = StepSchedule::new(Vec::new()).unwrap();
        let plan = schedule.plan(&RunId::new("r-1"), "hello");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].event.event_type, EventType::RunCompleted);
    }
}
