//! Configuration types for export-worker
//!
//! The whole tree is deserialised once at start-up (TOML) and handed to the
//! components behind an `Arc`; nothing reads process-wide settings later on.

use crate::error::{Error, Result};
use crate::types::TaskStatus;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

/// Main configuration for the export worker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream task manager API
    #[serde(default)]
    pub task_manager: TaskManagerConfig,

    /// What to export and how
    #[serde(default)]
    pub export: ExportConfig,

    /// Remote transfer endpoint (exactly one protocol active)
    #[serde(default)]
    pub transfer: TransferConfig,

    /// REST surface (health, event ingestion)
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).map_err(|e| Error::Config {
            message: format!("invalid configuration file: {}", e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let base_url = self.task_manager.base_url.trim();
        if base_url.is_empty() {
            return Err(Error::config(
                "task_manager.base_url",
                "task manager base URL must be set",
            ));
        }
        url::Url::parse(base_url).map_err(|e| {
            Error::config(
                "task_manager.base_url",
                format!("invalid task manager base URL '{}': {}", base_url, e),
            )
        })?;

        if self.export.exportable_statuses.is_empty() {
            return Err(Error::config(
                "export.exportable_statuses",
                "at least one exportable status is required",
            ));
        }

        if self.api.event_queue_capacity == 0 {
            return Err(Error::config(
                "api.event_queue_capacity",
                "event queue capacity must be at least 1",
            ));
        }

        let endpoint = self.transfer.active_endpoint()?;
        if endpoint.host.trim().is_empty() {
            return Err(Error::config(
                format!("transfer.{}.host", self.transfer.active_protocol_name()),
                "remote host must not be empty",
            ));
        }

        // SFTP joins directory and file name without a separator
        let directory = &self.transfer.sftp.remote_relative_destination_directory;
        if self.transfer.sftp.active && !directory.is_empty() && !directory.ends_with('/') {
            return Err(Error::config(
                "transfer.sftp.remote_relative_destination_directory",
                format!("SFTP directory '{}' must end with '/'", directory),
            ));
        }

        Ok(())
    }
}

/// Task manager (upstream REST API) settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskManagerConfig {
    /// Base URL, e.g. `http://task-manager:8080` (default: "http://localhost:8080")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Availability polling budget
    #[serde(default)]
    pub fetch_task: FetchTaskConfig,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            fetch_task: FetchTaskConfig::default(),
        }
    }
}

/// Availability poller settings
///
/// The poller always re-fetches a task once, then keeps going until the task
/// is ready or `retries` re-fetches ran, sleeping `interval` before each one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchTaskConfig {
    /// Re-fetch budget; the first re-fetch happens even at zero (default: 10)
    #[serde(default = "default_fetch_retries")]
    pub retries: u32,

    /// Sleep before each re-fetch (default: 2 seconds)
    #[serde(default = "default_fetch_interval", with = "duration_serde")]
    pub interval: Duration,
}

impl Default for FetchTaskConfig {
    fn default() -> Self {
        Self {
            retries: default_fetch_retries(),
            interval: default_fetch_interval(),
        }
    }
}

/// How a ready task is exported
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// One combined bundle per task (default)
    #[default]
    Combined,
    /// One payload per validated output, plus the task logs
    PerFile,
}

/// Export behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Combined bundle or per-file export (default: combined)
    #[serde(default)]
    pub mode: ExportMode,

    /// File types expanded on the remote side instead of stored as one archive
    #[serde(default)]
    pub unzip_files: Vec<String>,

    /// Statuses that trigger an export (default: SUCCESS, ERROR)
    #[serde(default = "default_exportable_statuses")]
    pub exportable_statuses: Vec<TaskStatus>,

    /// Pseudo file type fetched after the outputs in per-file mode (default: "LOGS")
    #[serde(default = "default_logs_file_type")]
    pub logs_file_type: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: ExportMode::default(),
            unzip_files: Vec::new(),
            exportable_statuses: default_exportable_statuses(),
            logs_file_type: default_logs_file_type(),
        }
    }
}

impl ExportConfig {
    /// Whether events with this status start an export
    pub fn is_exportable(&self, status: TaskStatus) -> bool {
        self.exportable_statuses.contains(&status)
    }

    /// Whether payloads of this file type are expanded on upload
    pub fn must_unzip(&self, file_type: &str) -> bool {
        self.unzip_files.iter().any(|t| t == file_type)
    }
}

/// Retry policy of the transfer adapter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRetryConfig {
    /// Retries after the first attempt (default: 3)
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,

    /// Linear backoff unit: attempt `n` waits `(n - 1) * retry_sleep` (default: 5 seconds)
    #[serde(default = "default_retry_sleep", with = "duration_serde")]
    pub retry_sleep: Duration,
}

impl Default for TransferRetryConfig {
    fn default() -> Self {
        Self {
            max_retry_count: default_max_retry_count(),
            retry_sleep: default_retry_sleep(),
        }
    }
}

/// Connection settings shared by both transfer protocols
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Whether this protocol is the active one
    #[serde(default)]
    pub active: bool,

    /// Remote hostname
    #[serde(default)]
    pub host: String,

    /// Remote port (default: 21 for FTP, 22 for SFTP; 0 means the default)
    #[serde(default)]
    pub port: u16,

    /// Login
    #[serde(default)]
    pub access_key: String,

    /// Password
    #[serde(default)]
    pub secret_key: String,

    /// Base directory every file is stored under
    ///
    /// FTP resolves it relative to the login directory; SFTP uses it as a path prefix.
    #[serde(default)]
    pub remote_relative_destination_directory: String,
}

impl EndpointConfig {
    fn inactive(port: u16) -> Self {
        Self {
            active: false,
            host: String::new(),
            port,
            access_key: String::new(),
            secret_key: String::new(),
            remote_relative_destination_directory: String::new(),
        }
    }

    /// `host:port` for logs and error messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which remote protocol is active
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferProtocol {
    /// Plain FTP with password login
    Ftp,
    /// SFTP over SSH with password login
    Sftp,
}

/// Remote transfer settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Retry policy shared by both protocols
    #[serde(flatten)]
    pub retry: TransferRetryConfig,

    /// FTP endpoint
    #[serde(
        default = "default_ftp_endpoint",
        deserialize_with = "endpoint_serde::ftp"
    )]
    pub ftp: EndpointConfig,

    /// SFTP endpoint
    #[serde(
        default = "default_sftp_endpoint",
        deserialize_with = "endpoint_serde::sftp"
    )]
    pub sftp: EndpointConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retry: TransferRetryConfig::default(),
            ftp: default_ftp_endpoint(),
            sftp: default_sftp_endpoint(),
        }
    }
}

impl TransferConfig {
    /// The single active protocol
    ///
    /// Activation flags are mutually exclusive: none or both active is an error.
    pub fn active_protocol(&self) -> Result<TransferProtocol> {
        match (self.ftp.active, self.sftp.active) {
            (true, false) => Ok(TransferProtocol::Ftp),
            (false, true) => Ok(TransferProtocol::Sftp),
            (true, true) => Err(Error::config(
                "transfer",
                "ftp and sftp are both active; enable exactly one",
            )),
            (false, false) => Err(Error::config(
                "transfer",
                "no transfer protocol is active; enable ftp or sftp",
            )),
        }
    }

    /// Settings of the active protocol
    pub fn active_endpoint(&self) -> Result<&EndpointConfig> {
        Ok(match self.active_protocol()? {
            TransferProtocol::Ftp => &self.ftp,
            TransferProtocol::Sftp => &self.sftp,
        })
    }

    fn active_protocol_name(&self) -> &'static str {
        match self.active_protocol() {
            Ok(TransferProtocol::Sftp) => "sftp",
            _ => "ftp",
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Events buffered between ingestion and export (default: 64)
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_retries() -> u32 {
    10
}

fn default_fetch_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_exportable_statuses() -> Vec<TaskStatus> {
    vec![TaskStatus::Success, TaskStatus::Error]
}

fn default_logs_file_type() -> String {
    "LOGS".to_string()
}

fn default_max_retry_count() -> u32 {
    3
}

fn default_retry_sleep() -> Duration {
    Duration::from_secs(5)
}

const FTP_DEFAULT_PORT: u16 = 21;
const SFTP_DEFAULT_PORT: u16 = 22;

fn default_ftp_endpoint() -> EndpointConfig {
    EndpointConfig::inactive(FTP_DEFAULT_PORT)
}

fn default_sftp_endpoint() -> EndpointConfig {
    EndpointConfig::inactive(SFTP_DEFAULT_PORT)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_event_queue_capacity() -> usize {
    64
}

// Endpoint tables without a port get the protocol's well-known one
mod endpoint_serde {
    use super::{EndpointConfig, FTP_DEFAULT_PORT, SFTP_DEFAULT_PORT};
    use serde::{Deserialize, Deserializer};

    pub fn ftp<'de, D>(deserializer: D) -> Result<EndpointConfig, D::Error>
    where
        D: Deserializer<'de>,
    {
        with_default_port(deserializer, FTP_DEFAULT_PORT)
    }

    pub fn sftp<'de, D>(deserializer: D) -> Result<EndpointConfig, D::Error>
    where
        D: Deserializer<'de>,
    {
        with_default_port(deserializer, SFTP_DEFAULT_PORT)
    }

    fn with_default_port<'de, D>(deserializer: D, port: u16) -> Result<EndpointConfig, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut endpoint = EndpointConfig::deserialize(deserializer)?;
        if endpoint.port == 0 {
            endpoint.port = port;
        }
        Ok(endpoint)
    }
}

// Durations are configured in whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
