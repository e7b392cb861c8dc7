//! AgentOps Worker Pool
//!
//! Workers are named members of one consumer group. Each claims `RUN_STARTED`
//! entries from the shared log, plays the run's step schedule back into the
//! log, and acknowledges the entry only once every emission succeeded.

pub mod config;
pub mod pool;
pub mod schedule;
pub mod worker;

pub use config::WorkerConfig;
pub use pool::WorkerPool;
pub use schedule::{PlannedEvent, Step, StepSchedule};
pub use worker::{Outcome, Worker, WorkerError};
