//! The waiter contract and its default implementation.
//!
//! A [`Waiter`] knows how to fetch fresh status for one kind of operation and
//! how to read that status. [`crate::operation_wait`] only talks to this trait,
//! so supporting a new backing API means writing an adapter, not a new loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ConversionError, OperationError, TransportError};
use crate::operation::Operation;

/// State label while the operation is still running.
pub const STATE_PENDING: &str = "pending";
/// State label once the operation reached a terminal point.
pub const STATE_COMPLETE: &str = "complete";
/// State label when no operation is held yet. Never pending, never a target.
pub const STATE_NIL: &str = "operation is nil";
/// Operation name reported when no operation is held yet.
pub const NIL_OPERATION_NAME: &str = "<nil>";

/// A failed status query, with whatever payload came back alongside the error.
#[derive(Debug, Clone)]
pub struct QueryFailure<P> {
    pub error: TransportError,
    pub payload: Option<P>,
}

impl<P> QueryFailure<P> {
    pub fn new(error: TransportError) -> Self {
        Self {
            error,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl<P> From<TransportError> for QueryFailure<P> {
    fn from(error: TransportError) -> Self {
        Self::new(error)
    }
}

/// Capabilities the poll loop needs from one kind of operation.
///
/// Querying ([`Waiter::query_op`]) and assigning ([`Waiter::set_op`]) are kept
/// apart so a failed query never touches the held handle.
#[async_trait]
pub trait Waiter: Send + Sync {
    /// Raw response type returned by the backing API.
    type Payload: Clone + Send + Sync;

    /// Label derived from the held handle. Must be stable for a given handle
    /// and, once a handle is held, one of the pending or target labels.
    fn state(&self) -> String;

    /// The embedded operation failure of the held handle, if any.
    fn error(&self) -> Option<OperationError>;

    /// Replace the held handle from a raw payload.
    fn set_op(&mut self, payload: &Self::Payload) -> Result<(), ConversionError>;

    /// Ask the backing API for the current status of the held operation.
    async fn query_op(&self) -> Result<Self::Payload, QueryFailure<Self::Payload>>;

    /// Identifier of the held operation, for diagnostics only.
    fn op_name(&self) -> String;

    fn pending_states(&self) -> &[&str];

    fn target_states(&self) -> &[&str];
}

/// Status lookup by operation name against a backing API.
#[async_trait]
pub trait OperationClient: Send + Sync {
    async fn get_operation(&self, name: &str) -> Result<Value, QueryFailure<Value>>;
}

#[async_trait]
impl<'a, T: OperationClient + ?Sized> OperationClient for &'a T {
    async fn get_operation(&self, name: &str) -> Result<Value, QueryFailure<Value>> {
        (**self).get_operation(name).await
    }
}

#[async_trait]
impl<T: OperationClient + ?Sized> OperationClient for Arc<T> {
    async fn get_operation(&self, name: &str) -> Result<Value, QueryFailure<Value>> {
        (**self).get_operation(name).await
    }
}

/// Waiter for operations shaped like [`Operation`] (`name`, `done`, `error`).
///
/// Holds at most one snapshot; every successful [`Waiter::set_op`] replaces it
/// wholesale.
#[derive(Debug)]
pub struct CommonOperationWaiter<C> {
    client: C,
    op: Option<Operation>,
}

impl<C: OperationClient> CommonOperationWaiter<C> {
    pub fn new(client: C) -> Self {
        Self { client, op: None }
    }

    pub fn with_operation(client: C, op: Operation) -> Self {
        Self {
            client,
            op: Some(op),
        }
    }

    /// Set the held handle from any API client representation of an operation.
    pub fn set_op_from<T: Serialize + ?Sized>(&mut self, op: &T) -> Result<(), ConversionError> {
        self.op = Some(Operation::from_serializable(op)?);
        Ok(())
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.op.as_ref()
    }

    pub fn into_operation(self) -> Option<Operation> {
        self.op
    }
}

#[async_trait]
impl<C: OperationClient> Waiter for CommonOperationWaiter<C> {
    type Payload = Value;

    fn state(&self) -> String {
        match &self.op {
            None => STATE_NIL.to_string(),
            Some(op) if op.done => STATE_COMPLETE.to_string(),
            Some(_) => STATE_PENDING.to_string(),
        }
    }

    fn error(&self) -> Option<OperationError> {
        self.op.as_ref().and_then(Operation::operation_error)
    }

    fn set_op(&mut self, payload: &Value) -> Result<(), ConversionError> {
        self.op = Some(Operation::from_value(payload)?);
        Ok(())
    }

    async fn query_op(&self) -> Result<Value, QueryFailure<Value>> {
        let Some(op) = &self.op else {
            return Err(QueryFailure::new(TransportError::InvalidRequest(
                "no operation to query".to_string(),
            )));
        };
        self.client.get_operation(&op.name).await
    }

    fn op_name(&self) -> String {
        self.op
            .as_ref()
            .map_or_else(|| NIL_OPERATION_NAME.to_string(), |op| op.name.clone())
    }

    fn pending_states(&self) -> &[&str] {
        &[STATE_PENDING]
    }

    fn target_states(&self) -> &[&str] {
        &[STATE_COMPLETE]
    }
}
