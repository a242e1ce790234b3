//! The operation handle: the last status snapshot fetched from the remote service.

use derive_new::new;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConversionError, OperationError};

/// Snapshot of a long-running operation.
///
/// Only `name`, `done` and `error` drive the wait. `metadata` and `response`
/// are carried through untouched so callers can read the created resource
/// once the operation completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

/// Structured failure embedded in a finished operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, new)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Value>,
}

impl Operation {
    /// Decode an operation from a raw JSON payload.
    pub fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(Self::deserialize(value)?)
    }

    /// Convert any API client representation of an operation.
    ///
    /// The value is converted field by field through its JSON form, so any
    /// struct that serializes to the operation wire shape is accepted.
    pub fn from_serializable<T: Serialize + ?Sized>(op: &T) -> Result<Self, ConversionError> {
        let value = serde_json::to_value(op)?;
        Self::from_value(&value)
    }

    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn succeeded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            ..Self::default()
        }
    }

    pub fn failed(name: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            name: name.into(),
            done: true,
            error: Some(status),
            ..Self::default()
        }
    }

    /// The embedded failure, if any.
    pub fn operation_error(&self) -> Option<OperationError> {
        self.error.as_ref().map(|status| OperationError {
            code: status.code,
            message: status.message.clone(),
        })
    }
}
