//! REST API server module
//!
//! Exposes the transfer endpoint health and the event ingestion queue that
//! feeds the export subscription.

use crate::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `GET /health` - Transfer endpoint health (`200 UP` / `503 DOWN`)
/// - `POST /events` - Queue a task-status event for export (`202`, `503` when full)
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/events", post(routes::publish_event))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the API server on `bind_address`.
///
/// Serves until the state's shutdown token fires, then drains in-flight
/// requests and returns.
///
/// # Example
///
/// ```no_run
/// use export_worker::api::{AppState, start_api_server};
/// use export_worker::config::TransferConfig;
/// use export_worker::transfer::TransferAdapter;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transfer = Arc::new(TransferAdapter::from_config(&TransferConfig::default())?);
/// let (events, _queue) = tokio::sync::mpsc::channel(64);
/// let state = AppState::new(transfer, events, CancellationToken::new());
///
/// start_api_server(state, "127.0.0.1:8080".parse()?).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(state: AppState, bind_address: SocketAddr) -> Result<()> {
    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
