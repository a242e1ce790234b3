//! Wait engine for long-running operations.
//!
//! Many provisioning APIs answer a mutating call with an operation handle
//! instead of a result. This crate turns polling that handle into a single
//! bounded call:
//!
//! - [`Waiter`]: how to query and read one kind of operation
//! - [`CommonOperationWaiter`]: the default waiter for `name`/`done`/`error` operations
//! - [`operation_wait`] / [`operation_wait_with`]: poll with backoff until a
//!   target state, a fatal error or the timeout
//!
//! ```no_run
//! use operation_waiter_core::{operation_wait, CommonOperationWaiter, OperationClient, Waiter};
//!
//! # async fn example(client: impl OperationClient, started: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
//! let mut waiter = CommonOperationWaiter::new(client);
//! waiter.set_op(&started)?;
//! operation_wait(&mut waiter, "creating project", 4).await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
mod config;
mod error;
mod operation;
mod retry;
mod wait;
mod waiter;

pub use backoff::Backoff;
pub use config::{WaitOptions, DEFAULT_TIMEOUT};
pub use error::{ConversionError, OperationError, RefreshError, TransportError, WaitError};
pub use operation::{Operation, OperationStatus};
pub use retry::{NeverRetry, RetryPolicy, TransientErrors};
pub use wait::{is_done, operation_wait, operation_wait_with, refresh, Refreshed};
pub use waiter::{
    CommonOperationWaiter, OperationClient, QueryFailure, Waiter, NIL_OPERATION_NAME,
    STATE_COMPLETE, STATE_NIL, STATE_PENDING,
};

// Re-exported so callers can build cancellable waits without naming tokio-util.
pub use tokio_util::sync::CancellationToken;
