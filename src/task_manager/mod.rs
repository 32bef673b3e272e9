//! Task manager client
//!
//! Reads task snapshots and output payloads from the upstream task manager:
//! - `GET {base}/tasks/{timestamp}` - task snapshot (JSON)
//! - `GET {base}/tasks/{timestamp}/outputs` - combined bundle
//! - `GET {base}/tasks/{timestamp}/file/{fileType}` - one output type
//!
//! No retries happen here; the availability poller decides whether to wait
//! longer, the exporter decides what a failed download means.

mod filename;

pub use filename::{DEFAULT_FILE_NAME, file_name_from_content_disposition};

use crate::config::TaskManagerConfig;
use crate::error::{Error, Result};
use crate::types::{Payload, TaskSnapshot, TaskTimestamp};
use async_trait::async_trait;

const TASKS_PATH: &str = "/tasks/";

/// Read access to upstream task state and payloads
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetch the current snapshot of the task addressed by `timestamp`
    ///
    /// `Ok(None)` means the task manager answered successfully without a body
    /// ("no data yet"), which is distinct from [`Error::RemoteUnavailable`].
    async fn fetch_snapshot(&self, timestamp: &TaskTimestamp) -> Result<Option<TaskSnapshot>>;

    /// Fetch the combined outputs bundle
    async fn fetch_bundle(&self, timestamp: &TaskTimestamp) -> Result<Payload>;

    /// Fetch the payload of a single output file type
    async fn fetch_by_file_type(
        &self,
        timestamp: &TaskTimestamp,
        file_type: &str,
    ) -> Result<Payload>;
}

/// HTTP implementation of [`TaskSource`]
#[derive(Clone, Debug)]
pub struct TaskManagerClient {
    http: reqwest::Client,
    base_url: String,
}

impl TaskManagerClient {
    /// Build a client for the configured task manager
    pub fn new(config: &TaskManagerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self::with_client(http, &config.base_url))
    }

    /// Use an existing HTTP client
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn task_url(&self, timestamp: &TaskTimestamp) -> String {
        format!("{}{}{}", self.base_url, TASKS_PATH, timestamp)
    }

    fn bundle_url(&self, timestamp: &TaskTimestamp) -> String {
        format!("{}/outputs", self.task_url(timestamp))
    }

    fn file_type_url(&self, timestamp: &TaskTimestamp, file_type: &str) -> String {
        format!(
            "{}/file/{}",
            self.task_url(timestamp),
            urlencoding::encode(file_type)
        )
    }

    /// GET `url`, mapping transport failures and non-2xx answers to `RemoteUnavailable`
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.http.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            Error::RemoteUnavailable {
                url: url.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteUnavailable {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        Ok(response)
    }

    async fn fetch_payload(&self, url: &str) -> Result<Payload> {
        let response = self.get(url).await?;

        let file_name = file_name_from_content_disposition(
            response
                .headers()
                .get(reqwest::header::CONTENT_DISPOSITION)
                .and_then(|value| value.to_str().ok()),
        );

        let bytes = response.bytes().await.map_err(|e| Error::RemoteUnavailable {
            url: url.to_string(),
            reason: format!("failed to read response body: {}", e),
        })?;

        tracing::debug!(url = %url, file_name = %file_name, size = bytes.len(), "payload fetched");

        Ok(Payload {
            file_name,
            bytes: bytes.to_vec(),
        })
    }
}

#[async_trait]
impl TaskSource for TaskManagerClient {
    async fn fetch_snapshot(&self, timestamp: &TaskTimestamp) -> Result<Option<TaskSnapshot>> {
        let url = self.task_url(timestamp);
        let response = self.get(&url).await?;

        let body = response.bytes().await.map_err(|e| Error::RemoteUnavailable {
            url: url.clone(),
            reason: format!("failed to read response body: {}", e),
        })?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let snapshot: Option<TaskSnapshot> = serde_json::from_slice(&body)?;
        Ok(snapshot)
    }

    async fn fetch_bundle(&self, timestamp: &TaskTimestamp) -> Result<Payload> {
        self.fetch_payload(&self.bundle_url(timestamp)).await
    }

    async fn fetch_by_file_type(
        &self,
        timestamp: &TaskTimestamp,
        file_type: &str,
    ) -> Result<Payload> {
        self.fetch_payload(&self.file_type_url(timestamp, file_type))
            .await
    }
}
