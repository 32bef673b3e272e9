use super::*;
use crate::config::TransferRetryConfig;
use crate::test_helpers::MemoryRemote;
use crate::transfer::TransferAdapter;
use crate::types::TaskSnapshot;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;


struct TestApi {
    state: AppState,
    remote: MemoryRemote,
    queue: mpsc::Receiver<TaskSnapshot>,
}

/// State over an in-memory remote and an event queue of `capacity`
fn test_api(capacity: usize) -> TestApi {
    let remote = MemoryRemote::new("outputs");
    let transfer = Arc::new(TransferAdapter::new(
        Arc::new(remote.clone()),
        TransferRetryConfig {
            max_retry_count: 0,
            retry_sleep: Duration::ZERO,
        },
    ));
    let (events, queue) = mpsc::channel(capacity);

    TestApi {
        state: AppState::new(transfer, events, CancellationToken::new()),
        remote,
        queue,
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_event(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown() {
    let api = test_api(4);
    let shutdown = api.state.shutdown.clone();

    // Port 0 = OS assigns a free port
    let server = tokio::spawn(start_api_server(
        api.state.clone(),
        "127.0.0.1:0".parse().unwrap(),
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let api = test_api(4);
    let app = create_router(api.state);

    let response = app
        .oneshot(Request::builder().uri("/tasks").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
