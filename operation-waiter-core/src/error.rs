//! Error taxonomy for the wait engine.
//!
//! Failures fall into three groups:
//! - [`TransportError`]: the status query itself failed. Whether it is retried
//!   is decided by a [`RetryPolicy`](crate::RetryPolicy).
//! - [`ConversionError`] and [`OperationError`]: the payload could not be read,
//!   or the operation finished with an embedded failure. Never retried.
//! - [`WaitError`]: what [`operation_wait`](crate::operation_wait) returns,
//!   always tagged with the caller's activity label.

use std::time::Duration;
use thiserror::Error;

/// A failed status query against the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The connection could not be established or was dropped.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request could not be issued at all.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, when the failure carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A raw payload could not be mapped onto the operation shape.
#[derive(Debug, Error)]
#[error("Failed to convert operation payload: {source}")]
pub struct ConversionError {
    #[from]
    source: serde_json::Error,
}

/// A failure reported by the operation itself once it reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error code {code}, message: {message}")]
pub struct OperationError {
    pub code: i32,
    pub message: String,
}

/// Fatal outcome of a single refresh step.
///
/// Retryable transport failures never show up here; they are absorbed by the
/// refresh step and only surface later as the last error of a timeout.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Not retriable error: {0}")]
    NotRetriable(#[source] TransportError),

    #[error("Cannot continue, operation is nil: {0}")]
    NilOperation(#[source] TransportError),

    #[error("Cannot continue: {0}")]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl RefreshError {
    pub(crate) fn into_wait_error(self, activity: &str) -> WaitError {
        let activity = activity.to_string();
        match self {
            Self::NotRetriable(source) => WaitError::NotRetriable { activity, source },
            Self::NilOperation(source) => WaitError::NilOperation { activity, source },
            Self::Conversion(source) => WaitError::Conversion { activity, source },
            Self::Operation(source) => WaitError::Operation { activity, source },
        }
    }
}

/// Errors returned by [`operation_wait`](crate::operation_wait).
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Error waiting for {activity}: not retriable error: {source}")]
    NotRetriable {
        activity: String,
        #[source]
        source: TransportError,
    },

    #[error("Error waiting for {activity}: cannot continue, operation is nil: {source}")]
    NilOperation {
        activity: String,
        #[source]
        source: TransportError,
    },

    #[error("Error waiting for {activity}: cannot continue: {source}")]
    Conversion {
        activity: String,
        #[source]
        source: ConversionError,
    },

    #[error("Error waiting for {activity}: {source}")]
    Operation {
        activity: String,
        #[source]
        source: OperationError,
    },

    #[error("Error waiting for {activity}: unexpected state '{state}' for operation {operation}, wanted target '{}'", .targets.join(", "))]
    UnexpectedState {
        activity: String,
        operation: String,
        state: String,
        targets: Vec<String>,
    },

    #[error(
        "Error waiting for {activity}: timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?}){}",
        .targets.join(", "),
        .last_error.as_ref().map(|e| format!(", last error: {e}")).unwrap_or_default()
    )]
    Timeout {
        activity: String,
        last_state: String,
        targets: Vec<String>,
        timeout: Duration,
        last_error: Option<TransportError>,
    },

    #[error("Error waiting for {activity}: cancelled")]
    Cancelled { activity: String },
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The embedded operation failure, if that is what ended the wait.
    pub fn operation_error(&self) -> Option<&OperationError> {
        match self {
            Self::Operation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The activity label the caller passed to the wait.
    pub fn activity(&self) -> &str {
        match self {
            Self::NotRetriable { activity, .. }
            | Self::NilOperation { activity, .. }
            | Self::Conversion { activity, .. }
            | Self::Operation { activity, .. }
            | Self::UnexpectedState { activity, .. }
            | Self::Timeout { activity, .. }
            | Self::Cancelled { activity } => activity,
        }
    }
}
