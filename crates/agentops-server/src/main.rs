//! AgentOps Server
//!
//! Hosts the event log, an in-process worker pool, and the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agentops_log::{EventLog, MemoryEventLog};
use agentops_server::{http, AppState, Config};
use agentops_worker::{StepSchedule, WorkerPool};

/// AgentOps run server.
#[derive(Parser, Debug)]
#[command(name = "agentops-server", about = "AgentOps run submission and streaming server")]
struct Args {
    /// HTTP server address
    #[arg(long, default_value = "127.0.0.1:8000")]
    http_addr: String,

    /// Number of in-process workers
    #[arg(long, default_value = "1")]
    workers: usize,

    /// Journal file for a durable log (in-memory only when omitted)
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Simulated work between run steps, in milliseconds
    #[arg(long, default_value = "500")]
    step_delay_ms: u64,

    /// Seconds a tail waits for events before sending a heartbeat
    #[arg(long, default_value = "5")]
    heartbeat_secs: u64,

    /// Seconds an unacknowledged delivery is held before it can be reclaimed
    #[arg(long, default_value = "30")]
    claim_timeout_secs: u64,

    /// Deliveries of one run before it is marked failed
    #[arg(long, default_value = "5")]
    max_deliveries: u32,

    /// Allowed CORS origin (repeatable)
    #[arg(long = "allowed-origin")]
    allowed_origins: Vec<String>,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config {
            http_addr: self.http_addr,
            workers: self.workers,
            journal_path: self.journal,
            claim_timeout: Duration::from_secs(self.claim_timeout_secs),
            ..Config::default()
        };

        if !self.allowed_origins.is_empty() {
            config.allowed_origins = self.allowed_origins;
        }
        config.worker.step_delay = Duration::from_millis(self.step_delay_ms);
        config.worker.max_deliveries = self.max_deliveries;
        config.tail.block_timeout = Duration::from_secs(self.heartbeat_secs);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("agentops=info".parse()?))
        .with_target(true)
        .init();

    config.validate()?;

    // Open the log
    let log = match &config.journal_path {
        Some(path) => MemoryEventLog::open(path)?,
        None => {
            info!("No journal configured - events are kept in memory only");
            MemoryEventLog::new()
        }
    };
    let log: Arc<dyn EventLog> = Arc::new(log.with_claim_timeout(config.claim_timeout));

    // Start workers
    let schedule = StepSchedule::standard(config.worker.step_delay);
    let pool = WorkerPool::spawn(log.clone(), config.worker.clone(), schedule, config.workers);

    // Create HTTP router
    let state = AppState::new(log, config.tail.clone());
    let router = http::create_router(state.clone(), &config.allowed_origins);

    let listener = TcpListener::bind(&config.http_addr).await?;
    info!(
        http_addr = %config.http_addr,
        workers = config.workers,
        "AgentOps server listening"
    );

    let shutdown = state.shutdown.clone();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await;

    if let Err(e) = &result {
        error!(error = %e, "HTTP server error");
    }

    pool.shutdown().await;
    info!("AgentOps server stopped");

    result.map_err(Into::into)
}
