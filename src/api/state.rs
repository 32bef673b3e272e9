//! Application state for the API server

use crate::transfer::TransferAdapter;
use crate::types::TaskSnapshot;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (Arc and channel handle clones only).
#[derive(Clone)]
pub struct AppState {
    /// Adapter checked by the health route
    pub transfer: Arc<TransferAdapter>,

    /// Queue feeding the export subscription
    pub events: mpsc::Sender<TaskSnapshot>,

    /// Fired on shutdown; new events are refused afterwards
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        transfer: Arc<TransferAdapter>,
        events: mpsc::Sender<TaskSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transfer,
            events,
            shutdown,
        }
    }
}
