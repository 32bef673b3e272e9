//! System handlers: health.

use crate::api::AppState;
use crate::types::HealthStatus;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// GET /health - Transfer endpoint reachability
///
/// Opens a connection, logs in and checks the base directory; nothing is written.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.transfer.health().await;

    let code = match status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(json!({
            "status": status,
            "endpoint": state.transfer.endpoint(),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
