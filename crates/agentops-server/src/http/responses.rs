//! HTTP request and response types.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

// ============================================================================
// Run types
// ============================================================================

/// Request body for the create-run endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    /// Free-text goal for the run.
    pub goal: String,
}

/// Response body for the create-run endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRunResponse {
    pub run_id: String,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// API errors mapped to HTTP statuses.
#[derive(Debug)]
pub enum ApiError {
    /// Request body was not valid JSON for the endpoint.
    InvalidJson { message: String },
    /// Goal was empty.
    EmptyGoal,
    /// No events for the run.
    RunNotFound { run_id: String },
    /// The event log could not be reached.
    LogUnavailable { message: String },
    /// Anything else.
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ApiError::InvalidJson { message } => (StatusCode::BAD_REQUEST, message),
            ApiError::EmptyGoal => (
                StatusCode::BAD_REQUEST,
                "Goal must not be empty".to_string(),
            ),
            ApiError::RunNotFound { run_id } => {
                (StatusCode::NOT_FOUND, format!("Run not found: {}", run_id))
            }
            ApiError::LogUnavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            ApiError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<agentops_log::LogError> for ApiError {
    fn from(e: agentops_log::LogError) -> Self {
        if e.is_transient() {
            ApiError::LogUnavailable {
                message: e.to_string(),
            }
        } else {
            ApiError::Internal {
                message: e.to_string(),
            }
        }
    }
}

impl From<crate::producer::SubmitError> for ApiError {
    fn from(e: crate::producer::SubmitError) -> Self {
        match e {
            crate::producer::SubmitError::EmptyGoal => ApiError::EmptyGoal,
            crate::producer::SubmitError::Log(e) => e.into(),
        }
    }
}
