//! Run submission, snapshot and live event handlers.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::sse::{Event, Sse},
    Json,
};
use futures_util::stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use agentops_core::{LogPosition, RunId, RunSummary};
use agentops_log::LogError;

use crate::http::responses::{ApiError, CreateRunRequest, CreateRunResponse};
use crate::state::AppState;
use crate::tail::{RunTail, TailItem};

/// Submit a run.
///
/// POST /runs
pub async fn create_run(
    State(state): State<Arc<AppState>>,
    json_result: Result<Json<CreateRunRequest>, JsonRejection>,
) -> Result<Json<CreateRunResponse>, ApiError> {
    let Json(req) = json_result.map_err(|rejection| {
        warn!(error = %rejection, "Invalid JSON in request body");
        ApiError::InvalidJson {
            message: rejection.body_text(),
        }
    })?;

    let run_id = state.producer.submit(&req.goal).await?;

    Ok(Json(CreateRunResponse {
        run_id: run_id.into_inner(),
    }))
}

/// Snapshot of a run rebuilt from the log.
///
/// GET /runs/:run_id
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSummary>, ApiError> {
    let run_id = RunId::new(run_id);
    let entries = state
        .log
        .read_from(LogPosition::GENESIS, usize::MAX, Duration::ZERO)
        .await?;

    RunSummary::from_entries(&run_id, &entries)
        .map(Json)
        .ok_or_else(|| ApiError::RunNotFound {
            run_id: run_id.into_inner(),
        })
}

/// Live events of a run as server-sent events.
///
/// GET /runs/:run_id/events
pub async fn stream_run_events(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let run_id = RunId::new(run_id);
    info!(run_id = %run_id, "Opening run tail");

    let tail = RunTail::new(state.log.clone(), run_id, state.tail.clone());
    let stream = tail
        .into_stream()
        .map(to_sse_event)
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream)
}

/// Convert a tail item to an SSE event.
///
/// Run events carry the event type as the SSE event name, the log position
/// as the id, and the flat event record as JSON data.
fn to_sse_event(item: Result<TailItem, LogError>) -> Result<Event, Infallible> {
    let event = match item {
        Ok(TailItem::Event(entry)) => {
            debug!(run_id = %entry.event.run_id, position = %entry.position, "Streaming run event");
            Event::default()
                .event(entry.event.event_type.as_str())
                .id(entry.position.to_string())
                .json_data(&entry.event)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
        }
        Ok(TailItem::Heartbeat) => Event::default().event("heartbeat").data("ping"),
        Err(e) => {
            warn!(error = %e, "Run tail failed");
            Event::default().event("error").data(e.to_string())
        }
    };
    Ok(event)
}
