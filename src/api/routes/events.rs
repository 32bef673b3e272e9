//! Event ingestion: task-status notifications queued for export.

use crate::api::AppState;
use crate::error::Error;
use crate::types::TaskSnapshot;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;

/// POST /events - Queue a task-status event
///
/// Answers 202 once queued. A full queue answers 503 so the sender can
/// redeliver later; nothing blocks the request.
pub async fn publish_event(
    State(state): State<AppState>,
    payload: Result<Json<TaskSnapshot>, JsonRejection>,
) -> Response {
    let Json(snapshot) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected malformed event");
            return Error::InvalidEvent {
                status: rejection.status().as_u16(),
                message: rejection.body_text(),
            }
            .into_response();
        }
    };

    if state.shutdown.is_cancelled() {
        return Error::ShuttingDown.into_response();
    }

    let task_id = snapshot.id;
    let timestamp = snapshot.timestamp.clone();
    let status = snapshot.status;

    match state.events.try_send(snapshot) {
        Ok(()) => {
            tracing::debug!(task_id = %task_id, timestamp = %timestamp, status = %status, "event queued");
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "task_id": task_id,
                    "timestamp": timestamp,
                    "status": status
                })),
            )
                .into_response()
        }
        Err(TrySendError::Full(_)) => {
            tracing::warn!(task_id = %task_id, timestamp = %timestamp, "event queue full");
            Error::QueueFull.into_response()
        }
        Err(TrySendError::Closed(_)) => Error::ShuttingDown.into_response(),
    }
}
