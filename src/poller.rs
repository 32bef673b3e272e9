//! Availability poller
//!
//! A task can report a terminal status before all of its outputs are marked
//! validated upstream. The poller bridges that gap by re-fetching the task
//! at a fixed interval until every output is validated or the budget runs out.

use crate::config::FetchTaskConfig;
use crate::retry::sleep_unless_cancelled;
use crate::task_manager::TaskSource;
use crate::types::TaskSnapshot;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What the poller ended up with
#[derive(Clone, Debug)]
pub struct PollOutcome {
    /// Latest snapshot known (the initial one if no re-fetch produced data)
    pub snapshot: TaskSnapshot,
    /// Whether `snapshot` is export-ready
    pub ready: bool,
    /// Re-fetches performed after the initial check
    pub refetches: u32,
}

/// Re-fetches a task until its outputs are all validated
pub struct AvailabilityPoller {
    source: Arc<dyn TaskSource>,
    config: FetchTaskConfig,
    cancel: CancellationToken,
}

impl AvailabilityPoller {
    /// Create a poller over `source`
    ///
    /// Cancelling `cancel` interrupts the current sleep; the poller then
    /// returns with whatever snapshot it already has.
    pub fn new(
        source: Arc<dyn TaskSource>,
        config: FetchTaskConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            config,
            cancel,
        }
    }

    /// Wait for every output of `initial` to become validated
    ///
    /// At least one re-fetch is always made, each preceded by `interval`, so a
    /// stale "ready" manifest on the event is refreshed before export. Polling
    /// stops at the first ready snapshot or once `retries` re-fetches ran
    /// (a zero budget still allows the first one). Fetch failures and empty
    /// answers count against the budget and leave the latest known snapshot
    /// untouched. Never fails: the caller decides what a not-ready outcome
    /// means.
    pub async fn await_outputs(&self, initial: TaskSnapshot) -> PollOutcome {
        let timestamp = initial.timestamp.clone();
        let mut ready = initial.is_export_ready();
        let mut latest = initial;
        let mut refetches = 0;

        loop {
            if !sleep_unless_cancelled(self.config.interval, &self.cancel).await {
                tracing::debug!(
                    timestamp = %timestamp,
                    refetches,
                    "poll interrupted, keeping latest snapshot"
                );
                break;
            }

            refetches += 1;

            match self.source.fetch_snapshot(&timestamp).await {
                Ok(Some(snapshot)) => {
                    ready = snapshot.is_export_ready();
                    latest = snapshot;
                }
                Ok(None) => {
                    tracing::debug!(timestamp = %timestamp, attempt = refetches, "task manager returned no data");
                }
                Err(e) => {
                    tracing::warn!(
                        timestamp = %timestamp,
                        attempt = refetches,
                        error = %e,
                        "task refresh failed, will retry"
                    );
                }
            }

            tracing::debug!(
                timestamp = %timestamp,
                attempt = refetches,
                max_attempts = self.config.retries,
                ready,
                "outputs availability checked"
            );

            if ready || refetches >= self.config.retries {
                break;
            }
        }

        PollOutcome {
            snapshot: latest,
            ready,
            refetches,
        }
    }
}
