//! HTTP transport for `operation-waiter-core`.
//!
//! [`HttpOperationClient`] resolves operation names against a REST endpoint
//! and plugs into [`CommonOperationWaiter`](operation_waiter_core::CommonOperationWaiter):
//!
//! ```no_run
//! use operation_waiter_http::HttpOperationClient;
//! use operation_waiter_core::operation_wait;
//!
//! # async fn example(started: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpOperationClient::builder()
//!     .endpoint("https://cloudresourcemanager.googleapis.com/v1")
//!     .bearer_token("ya29.token")
//!     .build()?;
//! let mut waiter = client.waiter(&started)?;
//! operation_wait(&mut waiter, "creating project", 4).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::HttpOperationClient;
pub use config::{HttpClientBuilder, DEFAULT_REQUEST_TIMEOUT};
pub use error::{HttpClientError, Result};
