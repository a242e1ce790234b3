//! Shared fixtures for the wait engine integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use operation_waiter_core::{OperationClient, QueryFailure, TransportError};
use serde_json::{json, Value};
use tokio::time::Instant;

pub type Reply = Result<Value, QueryFailure<Value>>;

pub const OP_NAME: &str = "operations/cp.7315617394762094592";

pub fn pending() -> Value {
    json!({ "name": OP_NAME, "done": false })
}

pub fn succeeded(project_number: &str) -> Value {
    json!({
        "name": OP_NAME,
        "done": true,
        "response": { "projectNumber": project_number }
    })
}

pub fn failed(code: i32, message: &str) -> Value {
    json!({
        "name": OP_NAME,
        "done": true,
        "error": { "code": code, "message": message }
    })
}

pub fn transport(error: TransportError) -> Reply {
    Err(QueryFailure::new(error))
}

pub fn transport_with_stale(error: TransportError, stale: Value) -> Reply {
    Err(QueryFailure::new(error).with_payload(stale))
}

/// Replays scripted replies in order, then repeats `fallback` forever.
/// Records the (tokio) instant of every query.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Reply>, fallback: Reply) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: Reply) -> Self {
        Self::new(Vec::new(), reply)
    }

    pub fn query_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn queried_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Offsets of each query relative to `origin`.
    pub fn query_offsets(&self, origin: Instant) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| at.duration_since(origin))
            .collect()
    }

    /// Time between consecutive queries.
    pub fn intervals(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }
}

#[async_trait]
impl OperationClient for ScriptedClient {
    async fn get_operation(&self, name: &str) -> Reply {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), name.to_string()));
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Never answers.
pub struct HangingClient;

#[async_trait]
impl OperationClient for HangingClient {
    async fn get_operation(&self, _name: &str) -> Reply {
        std::future::pending().await
    }
}
