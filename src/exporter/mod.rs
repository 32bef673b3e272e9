//! Export orchestration
//!
//! [`Exporter::consume`] handles one task-status event end to end:
//!
//! ```text
//! event ─► exportable status? ──no──► Ignored
//!              │ yes
//!              ▼
//!         poll until outputs validated ──budget spent──► NotReady
//!              │ ready
//!              ▼
//!         combined: bundle ─► upload
//!         per-file: each validated output ─► upload (+ logs)
//!              │
//!              ▼
//!         Exported(report)
//! ```
//!
//! Any error or panic inside the pipeline ends as [`ExportOutcome::Failed`];
//! nothing escapes, so the subscription driving [`Exporter::run`] keeps going.

use crate::config::{Config, ExportConfig, ExportMode};
use crate::poller::AvailabilityPoller;
use crate::task_manager::TaskSource;
use crate::transfer::TransferAdapter;
use crate::types::{ExportOutcome, ExportReport, Payload, TaskSnapshot, TaskTimestamp};
use futures::{FutureExt, Stream, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

/// Log target of the business audit trail
pub const BUSINESS_LOG_TARGET: &str = "business";

/// Per-event export pipeline
pub struct Exporter {
    export: ExportConfig,
    source: Arc<dyn TaskSource>,
    transfer: Arc<TransferAdapter>,
    poller: AvailabilityPoller,
    cancel: CancellationToken,
}

impl Exporter {
    /// Wire the pipeline from configuration and its two collaborators
    pub fn new(
        config: &Config,
        source: Arc<dyn TaskSource>,
        transfer: Arc<TransferAdapter>,
    ) -> Self {
        Self::with_cancellation(config, source, transfer, CancellationToken::new())
    }

    /// Same as [`Exporter::new`], sharing an existing cancellation token
    ///
    /// Cancelling the token stops [`Exporter::run`] and cuts poll sleeps short.
    pub fn with_cancellation(
        config: &Config,
        source: Arc<dyn TaskSource>,
        transfer: Arc<TransferAdapter>,
        cancel: CancellationToken,
    ) -> Self {
        let poller = AvailabilityPoller::new(
            source.clone(),
            config.task_manager.fetch_task.clone(),
            cancel.clone(),
        );

        Self {
            export: config.export.clone(),
            source,
            transfer,
            poller,
            cancel,
        }
    }

    /// Token observed by the subscription loop and the poller
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the subscription loop after the event in progress
    pub fn shutdown(&self) {
        info!("export subscription shutting down");
        self.cancel.cancel();
    }

    /// Handle one task-status event
    ///
    /// Never fails and never panics outward.
    pub async fn consume(&self, snapshot: TaskSnapshot) -> ExportOutcome {
        let span = tracing::info_span!(
            "export",
            task_id = %snapshot.id,
            timestamp = %snapshot.timestamp
        );

        let result = AssertUnwindSafe(self.process(snapshot))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = format!("panic: {}", panic_message(panic.as_ref()));
                span.in_scope(|| error!(reason = %reason, "export aborted unexpectedly"));
                ExportOutcome::Failed { reason }
            }
        }
    }

    /// Drain `events` one at a time until the stream ends or shutdown is requested
    ///
    /// Returns the number of events handled.
    pub async fn run<S>(&self, events: S) -> usize
    where
        S: Stream<Item = TaskSnapshot>,
    {
        futures::pin_mut!(events);
        let mut handled = 0;

        info!("export subscription started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = events.next() => next,
            };

            let Some(snapshot) = next else {
                break;
            };

            let outcome = self.consume(snapshot).await;
            handled += 1;
            debug!(?outcome, handled, "event handled");
        }

        info!(handled, "export subscription stopped");
        handled
    }

    async fn process(&self, snapshot: TaskSnapshot) -> ExportOutcome {
        if !self.export.is_exportable(snapshot.status) {
            debug!(status = %snapshot.status, "status not exportable, ignoring event");
            return ExportOutcome::Ignored;
        }

        info!(
            target: BUSINESS_LOG_TARGET,
            status = %snapshot.status,
            outputs = snapshot.outputs.len(),
            "export of task requested"
        );

        let polled = self.poller.await_outputs(snapshot).await;
        if !polled.ready {
            warn!(
                target: BUSINESS_LOG_TARGET,
                refetches = polled.refetches,
                "outputs are not all validated, export skipped"
            );
            return ExportOutcome::NotReady;
        }

        let snapshot = polled.snapshot;
        match self.export.mode {
            ExportMode::Combined => self.export_bundle(&snapshot.timestamp).await,
            ExportMode::PerFile => ExportOutcome::Exported(self.export_per_file(&snapshot).await),
        }
    }

    async fn export_bundle(&self, timestamp: &TaskTimestamp) -> ExportOutcome {
        let payload = match self.source.fetch_bundle(timestamp).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    target: BUSINESS_LOG_TARGET,
                    error = %e,
                    "outputs bundle could not be downloaded"
                );
                return ExportOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut report = ExportReport::default();
        self.push(payload, false, &mut report).await;
        ExportOutcome::Exported(report)
    }

    /// Every validated output in manifest order, then the task logs
    ///
    /// Artifacts are independent: a failed download or upload is recorded
    /// and the next artifact is still attempted.
    async fn export_per_file(&self, snapshot: &TaskSnapshot) -> ExportReport {
        let mut report = ExportReport::default();

        for output in snapshot.validated_outputs() {
            let unzip = self.export.must_unzip(&output.file_type);
            self.export_file_type(&snapshot.timestamp, &output.file_type, unzip, &mut report)
                .await;
        }

        self.export_file_type(
            &snapshot.timestamp,
            &self.export.logs_file_type,
            false,
            &mut report,
        )
        .await;

        info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "per-file export finished"
        );
        report
    }

    async fn export_file_type(
        &self,
        timestamp: &TaskTimestamp,
        file_type: &str,
        unzip: bool,
        report: &mut ExportReport,
    ) {
        match self.source.fetch_by_file_type(timestamp, file_type).await {
            Ok(payload) => self.push(payload, unzip, report).await,
            Err(e) => {
                error!(
                    target: BUSINESS_LOG_TARGET,
                    file_type = %file_type,
                    error = %e,
                    "output could not be downloaded"
                );
                report.failed.push(file_type.to_string());
            }
        }
    }

    async fn push(&self, payload: Payload, unzip: bool, report: &mut ExportReport) {
        let Payload { file_name, bytes } = payload;

        match self.transfer.upload(&file_name, unzip, bytes).await {
            Ok(()) => {
                info!(
                    target: BUSINESS_LOG_TARGET,
                    file_name = %file_name,
                    "file exported"
                );
                report.uploaded.push(file_name);
            }
            Err(e) => {
                error!(
                    target: BUSINESS_LOG_TARGET,
                    file_name = %file_name,
                    error = %e,
                    "file could not be exported"
                );
                report.failed.push(file_name);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
