//! HTTP server for the run API.
//!
//! Provides endpoints for:
//! - Run submission (`POST /runs`)
//! - Run snapshot (`GET /runs/:run_id`)
//! - Live run events over SSE (`GET /runs/:run_id/events`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
///
/// An empty `allowed_origins` list allows any origin.
pub fn create_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        // API routes
        .route("/runs", post(handlers::create_run))
        .route("/runs/:run_id", get(handlers::get_run))
        .route("/runs/:run_id/events", get(handlers::stream_run_events))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
