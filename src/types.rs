//! Core types for export-worker

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of an upstream task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub uuid::Uuid);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl From<uuid::Uuid> for TaskId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Business time key of a task, kept exactly as the upstream serialised it
///
/// The task manager addresses its REST resources by this value, so it is
/// echoed back verbatim (e.g. `2022-04-27T10:10Z`) rather than re-formatted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskTimestamp(String);

impl TaskTimestamp {
    /// Wrap a raw timestamp string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The wire representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the timestamp as an RFC 3339 date-time
    ///
    /// Minute-precision values such as `2022-04-27T10:10Z` are accepted as well.
    pub fn parse(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.0)
            .or_else(|_| DateTime::parse_from_str(&self.0, "%Y-%m-%dT%H:%M%#z"))
            .ok()
    }
}

impl From<&str> for TaskTimestamp {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl std::fmt::Display for TaskTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task status as reported by the task manager
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task not created yet
    NotCreated,
    /// Task created, inputs incomplete
    Created,
    /// All inputs present
    Ready,
    /// Run requested, waiting for a worker
    Pending,
    /// Computation in progress
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Error,
    /// Stop requested
    Stopping,
    /// Stopped before completion
    Interrupted,
    /// Any status this worker does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::NotCreated => "NOT_CREATED",
            TaskStatus::Created => "CREATED",
            TaskStatus::Ready => "READY",
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Error => "ERROR",
            TaskStatus::Stopping => "STOPPING",
            TaskStatus::Interrupted => "INTERRUPTED",
            TaskStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Validation state of one expected output file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileValidationStatus {
    /// File produced and validated, safe to export
    Validated,
    /// File not produced (yet)
    NotPresent,
    /// File produced but rejected
    Invalid,
    /// Any status this worker does not know about
    #[serde(other)]
    Unknown,
}

/// One artifact a task is expected to produce
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    /// Category tag, used to address the file and to decide on archive expansion
    pub file_type: String,

    /// Validation state
    #[serde(rename = "processFileStatus", alias = "validationStatus")]
    pub validation_status: FileValidationStatus,

    /// File name as known upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Last time upstream touched the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_date: Option<DateTime<Utc>>,
}

impl OutputFile {
    /// Create an output file entry with only the fields the exporter relies on
    pub fn new(file_type: impl Into<String>, validation_status: FileValidationStatus) -> Self {
        Self {
            file_type: file_type.into(),
            validation_status,
            filename: None,
            last_modification_date: None,
        }
    }

    /// Whether the file is validated and therefore exportable
    pub fn is_validated(&self) -> bool {
        self.validation_status == FileValidationStatus::Validated
    }
}

/// State of an upstream task at one point in time
///
/// Snapshots are never mutated; fetching the task again yields a new snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// Task identifier
    pub id: TaskId,
    /// Business time key used to address the task's resources
    pub timestamp: TaskTimestamp,
    /// Current status
    pub status: TaskStatus,
    /// Input files (informational only)
    #[serde(default)]
    pub inputs: Vec<OutputFile>,
    /// Expected output files, in manifest order
    #[serde(default)]
    pub outputs: Vec<OutputFile>,
}

impl TaskSnapshot {
    /// A task is export-ready when every expected output is validated.
    ///
    /// An empty manifest is vacuously ready.
    pub fn is_export_ready(&self) -> bool {
        self.outputs.iter().all(OutputFile::is_validated)
    }

    /// Validated outputs in manifest order
    pub fn validated_outputs(&self) -> impl Iterator<Item = &OutputFile> {
        self.outputs.iter().filter(|output| output.is_validated())
    }
}

/// Binary payload downloaded from the task manager
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    /// Suggested remote file name (from the Content-Disposition header)
    pub file_name: String,
    /// Raw content
    pub bytes: Vec<u8>,
}

/// Artifacts attempted while exporting one task
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Remote names of artifacts stored successfully
    pub uploaded: Vec<String>,
    /// Names (or file types, when the download itself failed) of artifacts that failed
    pub failed: Vec<String>,
}

impl ExportReport {
    /// Number of artifacts attempted
    pub fn artifacts(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    /// True when every attempted artifact was stored
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of handling one task-status event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// Status is not exportable, nothing was done
    Ignored,
    /// Outputs never all became validated within the poll budget
    NotReady,
    /// Artifacts were fetched and pushed (possibly with per-artifact failures)
    Exported(ExportReport),
    /// The pipeline broke for this event; the subscription carries on
    Failed {
        /// Human-readable cause
        reason: String,
    },
}

/// Reachability of the remote transfer endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Connected, authenticated and found the base directory
    Up,
    /// Any of the above failed
    Down,
}
