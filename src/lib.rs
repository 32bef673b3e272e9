//! # export-worker
//!
//! Event-driven export of task outputs to a remote FTP or SFTP endpoint.
//!
//! For every task-status event the worker:
//! 1. ignores statuses that are not configured as exportable,
//! 2. polls the task manager until every expected output is validated,
//! 3. downloads either the combined bundle or each validated output (plus logs),
//! 4. pushes each payload to the remote endpoint with bounded, linear-backoff retries,
//!    optionally expanding zip archives on the remote side.
//!
//! ## Quick Start
//!
//! ```no_run
//! use export_worker::{Config, Exporter, TaskManagerClient, TransferAdapter};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(std::path::Path::new("export-worker.toml"))?;
//!
//!     let source = Arc::new(TaskManagerClient::new(&config.task_manager)?);
//!     let transfer = Arc::new(TransferAdapter::from_config(&config.transfer)?);
//!     let exporter = Exporter::new(&config, source, transfer);
//!
//!     // Feed it any stream of task snapshots
//!     let events = futures::stream::empty();
//!     exporter.run(events).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Export orchestration
pub mod exporter;
/// Output availability polling
pub mod poller;
/// Retry logic with linear backoff
pub mod retry;
/// Task manager client
pub mod task_manager;
/// Remote file transfer
pub mod transfer;
/// Core types
pub mod types;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, ExportMode};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus, TransferError};
pub use exporter::{BUSINESS_LOG_TARGET, Exporter};
pub use poller::{AvailabilityPoller, PollOutcome};
pub use task_manager::{TaskManagerClient, TaskSource};
pub use transfer::{RemoteSession, SessionConnector, TransferAdapter};
pub use types::{
    ExportOutcome, ExportReport, FileValidationStatus, HealthStatus, OutputFile, Payload, TaskId,
    TaskSnapshot, TaskStatus, TaskTimestamp,
};

/// Run the exporter until a termination signal arrives, then shut it down.
///
/// Listens for Ctrl+C everywhere and additionally for SIGTERM on unix.
/// Shutdown stops the subscription loop and cuts poll and retry sleeps short.
///
/// # Example
///
/// ```no_run
/// use export_worker::{Config, Exporter, TaskManagerClient, TransferAdapter, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let source = Arc::new(TaskManagerClient::new(&config.task_manager)?);
///     let transfer = Arc::new(TransferAdapter::from_config(&config.transfer)?);
///     let exporter = Arc::new(Exporter::new(&config, source, transfer));
///
///     tokio::spawn({
///         let exporter = exporter.clone();
///         async move { run_with_shutdown(&exporter).await }
///     });
///
///     exporter.run(futures::stream::pending()).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(exporter: &Exporter) {
    shutdown_on(exporter, wait_for_signal()).await;
}

/// Shut `exporter` down once `signal` resolves, logging which signal it was
pub async fn shutdown_on<F>(exporter: &Exporter, signal: F)
where
    F: std::future::Future<Output = &'static str>,
{
    let name = signal.await;
    tracing::info!(signal = name, "termination requested, stopping exporter");
    exporter.shutdown();
}

async fn wait_for_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
