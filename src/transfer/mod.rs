//! Remote transfer adapter
//!
//! Pushes payloads to the single configured remote endpoint (FTP or SFTP).
//! Protocols plug in through two small blocking capability traits:
//! [`SessionConnector`] opens a connection and [`RemoteSession`] drives it.
//! Every upload attempt runs on the blocking pool with its own session; the
//! session is closed at the end of the attempt whatever the outcome.

mod archive;
mod ftp;
mod sftp;

pub use archive::{ArchiveEntry, archive_directory_name, expand_zip_entries, parent_directories};
pub use ftp::FtpConnector;
pub use sftp::SftpConnector;

use crate::config::{TransferConfig, TransferProtocol, TransferRetryConfig};
use crate::error::{Result, TransferError};
use crate::retry::retry_with_linear_backoff;
use crate::types::HealthStatus;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One open connection to the remote endpoint
///
/// Paths handed to [`make_directory`](RemoteSession::make_directory) and
/// [`store`](RemoteSession::store) are relative to the configured base directory.
pub trait RemoteSession: Send {
    /// Log in with the configured credentials
    fn authenticate(&mut self) -> std::result::Result<(), TransferError>;

    /// Make sure the base directory is reachable (and enter it where the protocol allows)
    fn navigate(&mut self) -> std::result::Result<(), TransferError>;

    /// Create a directory under the base directory
    fn make_directory(&mut self, path: &str) -> std::result::Result<(), TransferError>;

    /// Write `bytes` as a binary file under the base directory
    fn store(&mut self, path: &str, bytes: &[u8]) -> std::result::Result<(), TransferError>;

    /// Tear the connection down; errors are logged, never returned
    fn close(&mut self);
}

/// Opens fresh sessions to one remote endpoint
pub trait SessionConnector: Send + Sync {
    /// Connect to the remote host
    fn open(&self) -> std::result::Result<Box<dyn RemoteSession>, TransferError>;

    /// Endpoint description for logs, e.g. `sftp://host:22`
    fn describe(&self) -> String;
}

/// Uploads payloads with bounded retries and optional archive expansion
#[derive(Clone)]
pub struct TransferAdapter {
    connector: Arc<dyn SessionConnector>,
    retry: TransferRetryConfig,
    cancel: CancellationToken,
}

impl TransferAdapter {
    /// Create an adapter over an explicit connector
    pub fn new(connector: Arc<dyn SessionConnector>, retry: TransferRetryConfig) -> Self {
        Self {
            connector,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the adapter for whichever protocol the configuration activates
    pub fn from_config(config: &TransferConfig) -> Result<Self> {
        let connector: Arc<dyn SessionConnector> = match config.active_protocol()? {
            TransferProtocol::Ftp => Arc::new(FtpConnector::new(config.ftp.clone())),
            TransferProtocol::Sftp => Arc::new(SftpConnector::new(config.sftp.clone())),
        };

        info!(
            endpoint = %connector.describe(),
            max_retry_count = config.retry.max_retry_count,
            "transfer adapter configured"
        );

        Ok(Self::new(connector, config.retry.clone()))
    }

    /// Interrupt backoff sleeps when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Endpoint description for logs
    pub fn endpoint(&self) -> String {
        self.connector.describe()
    }

    /// Upload `bytes` as `file_name`, or expand it as a zip archive when `unzip` is set
    ///
    /// Makes at most `max_retry_count + 1` attempts with linear backoff.
    /// Only [`TransferError::Exhausted`] is returned.
    pub async fn upload(
        &self,
        file_name: &str,
        unzip: bool,
        bytes: Vec<u8>,
    ) -> std::result::Result<(), TransferError> {
        let bytes: Arc<[u8]> = bytes.into();

        let result = retry_with_linear_backoff(
            self.retry.max_retry_count,
            self.retry.retry_sleep,
            &self.cancel,
            |attempt| {
                let connector = self.connector.clone();
                let file_name = file_name.to_string();
                let bytes = bytes.clone();
                let span = tracing::Span::current();

                async move {
                    debug!(file_name = %file_name, attempt, "upload attempt");
                    let task_name = file_name.clone();
                    tokio::task::spawn_blocking(move || {
                        span.in_scope(|| run_attempt(connector.as_ref(), &file_name, unzip, &bytes))
                    })
                    .await
                    .unwrap_or_else(|e| {
                        Err(TransferError::Store {
                            file_name: task_name,
                            reason: format!("upload task failed: {}", e),
                        })
                    })
                }
            },
        )
        .await;

        match result {
            Ok(()) => {
                info!(file_name = %file_name, endpoint = %self.endpoint(), "file uploaded");
                Ok(())
            }
            Err(exhausted) => Err(TransferError::Exhausted {
                file_name: file_name.to_string(),
                attempts: exhausted.attempts,
                last_error: exhausted.last_error.to_string(),
            }),
        }
    }

    /// Check the endpoint: connect, authenticate, reach the base directory
    ///
    /// Nothing is written remotely.
    pub async fn health(&self) -> HealthStatus {
        let connector = self.connector.clone();

        let check = tokio::task::spawn_blocking(move || {
            let mut session = connector.open()?;
            let result = session
                .authenticate()
                .and_then(|()| session.navigate());
            session.close();
            result
        })
        .await;

        match check {
            Ok(Ok(())) => HealthStatus::Up,
            Ok(Err(e)) => {
                warn!(endpoint = %self.endpoint(), error = %e, "transfer endpoint unhealthy");
                HealthStatus::Down
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint(), error = %e, "health check task failed");
                HealthStatus::Down
            }
        }
    }
}

/// One complete attempt on a fresh session
fn run_attempt(
    connector: &dyn SessionConnector,
    file_name: &str,
    unzip: bool,
    bytes: &[u8],
) -> std::result::Result<(), TransferError> {
    let mut session = connector.open()?;
    let result = transfer(session.as_mut(), file_name, unzip, bytes);
    session.close();
    result
}

fn transfer(
    session: &mut dyn RemoteSession,
    file_name: &str,
    unzip: bool,
    bytes: &[u8],
) -> std::result::Result<(), TransferError> {
    session.authenticate()?;
    session.navigate()?;

    if unzip {
        expand_into(session, file_name, bytes)
    } else {
        session.store(file_name, bytes)
    }
}

/// Store every archive entry under a directory named after the archive
///
/// Nested entry names get their intermediate directories created first.
/// One failing entry does not stop the others; the attempt fails if any did.
fn expand_into(
    session: &mut dyn RemoteSession,
    file_name: &str,
    bytes: &[u8],
) -> std::result::Result<(), TransferError> {
    let directory = archive_directory_name(file_name);

    // may already exist from an earlier attempt or export
    if let Err(e) = session.make_directory(directory) {
        debug!(directory = %directory, error = %e, "directory creation failed");
    }

    let entries = expand_zip_entries(bytes).map_err(|e| TransferError::InvalidArchive {
        file_name: file_name.to_string(),
        reason: e.to_string(),
    })?;

    let total = entries.len();
    let mut failed = 0;
    let mut created = HashSet::new();

    for entry in &entries {
        for parent in parent_directories(&entry.name) {
            if created.insert(parent) {
                let nested = format!("{}/{}", directory, parent);
                if let Err(e) = session.make_directory(&nested) {
                    debug!(directory = %nested, error = %e, "directory creation failed");
                }
            }
        }

        let path = format!("{}/{}", directory, entry.name);
        match session.store(&path, &entry.bytes) {
            Ok(()) => debug!(path = %path, "archive entry stored"),
            Err(e) => {
                warn!(path = %path, error = %e, "archive entry could not be stored");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(TransferError::EntriesFailed {
            file_name: file_name.to_string(),
            failed,
            total,
        });
    }

    Ok(())
}
