//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use agentops_worker::WorkerConfig;

use crate::tail::TailConfig;

/// Origins allowed to call the API from a browser by default.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:3001",
    "http://127.0.0.1:3001",
];

/// Rejected configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "claim timeout ({claim_timeout:?}) must be longer than the step delay ({step_delay:?})"
    )]
    ClaimTimeoutTooShort {
        claim_timeout: Duration,
        step_delay: Duration,
    },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub http_addr: String,

    /// Number of workers to run in-process.
    pub workers: usize,

    /// Journal file; `None` keeps the log in memory only.
    pub journal_path: Option<PathBuf>,

    /// How long a worker may hold an entry before another can reclaim it.
    pub claim_timeout: Duration,

    /// Browser origins allowed by CORS.
    pub allowed_origins: Vec<String>,

    /// Worker pool settings.
    pub worker: WorkerConfig,

    /// Run tail settings.
    pub tail: TailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8000".to_string(),
            workers: 1,
            journal_path: None,
            claim_timeout: agentops_log::memory::DEFAULT_CLAIM_TIMEOUT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            worker: WorkerConfig::default(),
            tail: TailConfig::default(),
        }
    }
}

impl Config {
    /// Check settings that only make sense together.
    ///
    /// Workers renew their claim once per step, so a step must finish
    /// within the claim timeout or the run is handed to another worker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.claim_timeout <= self.worker.step_delay {
            return Err(ConfigError::ClaimTimeoutTooShort {
                claim_timeout: self.claim_timeout,
                step_delay: self.worker.step_delay,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_step_longer_than_claim_timeout_is_rejected() {
        let mut config = Config {
            claim_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        config.worker.step_delay = Duration::from_secs(2);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ClaimTimeoutTooShort { .. }));

        config.worker.step_delay = Duration::from_millis(1999);
        assert!(config.validate().is_ok());
    }
}
