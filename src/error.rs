//! Error types for export-worker
//!
//! This module provides:
//! - The crate-wide [`Error`] type and [`Result`] alias
//! - [`TransferError`], the failure family of the remote transfer adapter
//! - HTTP status code mapping for the REST surface

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for export-worker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for export-worker
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "task_manager.base_url")
        key: Option<String>,
    },

    /// The task manager could not be reached or answered with a non-2xx status
    #[error("task manager unavailable at {url}: {reason}")]
    RemoteUnavailable {
        /// Requested resource
        url: String,
        /// Transport error or HTTP status
        reason: String,
    },

    /// Remote file transfer failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error outside of a fetch (e.g. building the client)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event body could not be read as a task snapshot
    #[error("invalid event: {message}")]
    InvalidEvent {
        /// HTTP status chosen by the body extractor (400, 415 or 422)
        status: u16,
        /// Why the body was rejected
        message: String,
    },

    /// The event queue has no free slot; the sender should redeliver later
    #[error("event queue is full")]
    QueueFull,

    /// Shutdown in progress - not accepting new events
    #[error("shutdown in progress: not accepting new events")]
    ShuttingDown,
}

impl Error {
    /// Shorthand for a configuration error on a given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Remote transfer failures
///
/// Only [`TransferError::Exhausted`] escapes [`crate::transfer::TransferAdapter::upload`];
/// the other variants describe why an individual attempt failed.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Could not open a session to the remote host
    #[error("failed to connect to {host}: {reason}")]
    Connect {
        /// host:port that was dialled
        host: String,
        /// Underlying cause
        reason: String,
    },

    /// Credentials were rejected
    #[error("authentication failed for {user}: {reason}")]
    Authentication {
        /// Account used
        user: String,
        /// Underlying cause
        reason: String,
    },

    /// Base directory is missing or not accessible
    #[error("cannot enter remote directory {path}: {reason}")]
    Navigate {
        /// Remote directory
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Remote directory creation failed
    #[error("cannot create remote directory {path}: {reason}")]
    MakeDirectory {
        /// Remote directory
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Writing a remote file failed
    #[error("failed to store {file_name}: {reason}")]
    Store {
        /// Remote file name
        file_name: String,
        /// Underlying cause
        reason: String,
    },

    /// Payload flagged for expansion is not a readable zip archive
    #[error("invalid archive {file_name}: {reason}")]
    InvalidArchive {
        /// Archive name
        file_name: String,
        /// Underlying cause
        reason: String,
    },

    /// Some entries of an expanded archive could not be stored
    #[error("{failed} of {total} entries of {file_name} could not be stored")]
    EntriesFailed {
        /// Archive name
        file_name: String,
        /// Entries that failed
        failed: usize,
        /// Entries in the archive
        total: usize,
    },

    /// Every attempt failed (the adapter's only outward failure)
    #[error("upload of {file_name} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// Remote file name
        file_name: String,
        /// Attempts made
        attempts: u32,
        /// Cause of the final attempt's failure
        last_error: String,
    },
}

/// API error response format
///
/// ```json
/// {
///   "error": {
///     "code": "queue_full",
///     "message": "event queue is full"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "shutting_down")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidEvent { status, .. } => *status,

            Error::Io(_) | Error::Serialization(_) => 500,

            // External services
            Error::RemoteUnavailable { .. } => 502,
            Error::Network(_) => 502,
            Error::Transfer(_) => 502,

            Error::QueueFull | Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::RemoteUnavailable { .. } => "remote_unavailable",
            Error::Transfer(e) => match e {
                TransferError::Exhausted { .. } => "transfer_exhausted",
                _ => "transfer_error",
            },
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidEvent { .. } => "invalid_event",
            Error::QueueFull => "queue_full",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::RemoteUnavailable { url, .. } => Some(serde_json::json!({ "url": url })),
            Error::Transfer(TransferError::Exhausted {
                file_name,
                attempts,
                ..
            }) => Some(serde_json::json!({
                "file_name": file_name,
                "attempts": attempts,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
