//! Retry logic with linear backoff
//!
//! Transfers are retried a bounded number of times: attempt `n` (1-based) is
//! preceded by a sleep of `(n - 1) * step`. Sleeps are cancellable; a
//! cancelled sleep ends the retry loop early with the last error.
//!
//! # Example
//!
//! ```no_run
//! use export_worker::retry::retry_with_linear_backoff;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let cancel = CancellationToken::new();
//! let result = retry_with_linear_backoff(3, Duration::from_secs(5), &cancel, |attempt| async move {
//!     // Your operation here
//!     Ok::<_, String>(attempt)
//! })
//! .await;
//! # let _ = result;
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// All attempts failed (or the loop was interrupted between attempts)
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Attempts actually made
    pub attempts: u32,
    /// Error of the final attempt
    pub last_error: E,
    /// Whether a cancellation cut the loop short
    pub cancelled: bool,
}

/// Sleep for `delay` unless `cancel` fires first
///
/// Returns `true` when the full delay elapsed, `false` when interrupted.
pub async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Run `operation` up to `max_retries + 1` times with linear backoff
///
/// `operation` receives the 1-based attempt number. Every failure is retried;
/// callers that need to classify errors do so inside the operation.
pub async fn retry_with_linear_backoff<F, Fut, T, E>(
    max_retries: u32,
    step: Duration,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if attempt < max_attempts => {
                let delay = step * attempt;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                if !sleep_unless_cancelled(delay, cancel).await {
                    tracing::warn!(
                        attempts = attempt,
                        "Retry sleep interrupted, giving up"
                    );
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                        cancelled: true,
                    });
                }

                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                    cancelled: false,
                });
            }
        }
    }
}
