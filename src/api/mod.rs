//! HTTP surface exposed by the pipeline: retry and liveness.
//!
//! The admin CRUD surface and upload acceptance live in an external
//! collaborator; the pipeline only exposes the retry contract it owns, so
//! the error surface is the retry pre-condition taxonomy mapped onto
//! status codes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::pipeline::{RetryError, RetryService};

#[derive(Clone)]
pub struct ApiState {
    pub retry: Arc<RetryService>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/meetings/:meeting_id/retry", post(retry_meeting))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn retry_meeting(
    State(state): State<ApiState>,
    Path(meeting_id): Path<String>,
) -> Result<Json<Value>, RetryFailure> {
    info!("Retry requested for meeting {meeting_id}");
    state.retry.retry(&meeting_id).await?;

    Ok(Json(json!({
        "success": true,
        "meetingId": meeting_id,
        "message": "meeting re-enqueued for transcription",
    })))
}

/// A retry pre-condition failure crossing the HTTP boundary.
///
/// Missing record is the client's problem (404), a non-failed record is a
/// bad request (400), losing the conditional update to a concurrent retry
/// is a conflict (409), and anything downstream of the reset is ours (500).
pub struct RetryFailure(RetryError);

impl RetryFailure {
    fn status(&self) -> StatusCode {
        match &self.0 {
            RetryError::NotFound(_) => StatusCode::NOT_FOUND,
            RetryError::NotFailed(_) => StatusCode::BAD_REQUEST,
            RetryError::Conflict(_) => StatusCode::CONFLICT,
            RetryError::Enqueue(_, _) | RetryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RetryError> for RetryFailure {
    fn from(error: RetryError) -> Self {
        Self(error)
    }
}

impl IntoResponse for RetryFailure {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
