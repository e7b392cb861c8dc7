//! HTTP request handlers.

mod health;
mod runs;

pub use health::{health_check, metrics_handler};
pub use runs::{create_run, get_run, stream_run_events};
