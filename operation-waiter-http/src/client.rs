//! Operation status lookups over HTTP.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, warn};
use operation_waiter_core::{
    CommonOperationWaiter, ConversionError, OperationClient, QueryFailure, TransportError, Waiter,
};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use crate::config::HttpClientBuilder;
use crate::error::Result;

/// Google-style error envelope: `{"error": {"code": .., "message": .., "status": ..}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Fetches operations with `GET {endpoint}/{name}`.
///
/// The last successfully decoded payload of each unfinished operation is kept
/// so that a failed lookup can still hand the wait loop the freshest snapshot.
/// The entry is dropped as soon as the operation reports `done`.
#[derive(Debug)]
pub struct HttpOperationClient {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
    last_seen: RwLock<HashMap<String, Value>>,
}

impl HttpOperationClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub(crate) fn from_builder(builder: HttpClientBuilder) -> Result<Self> {
        builder.validate()?;
        let base_url = builder.base_url()?;
        let http = builder.build_http_client()?;
        debug!("Created operation client for {base_url}");

        Ok(Self {
            http,
            base_url,
            bearer_token: builder.config().bearer_token.clone(),
            last_seen: RwLock::new(HashMap::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an operation name such as `operations/abc` under the endpoint.
    ///
    /// Names come back from the server on every poll, so the result must stay
    /// on the endpoint's origin and under its base path.
    pub fn operation_url(&self, name: &str) -> std::result::Result<Url, TransportError> {
        let invalid = |reason: &str| {
            TransportError::InvalidRequest(format!("bad operation name '{name}': {reason}"))
        };

        if Url::parse(name).is_ok() {
            return Err(invalid("absolute URLs are not allowed"));
        }

        let url = self
            .base_url
            .join(name.trim_start_matches('/'))
            .map_err(|e| invalid(&e.to_string()))?;

        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
            return Err(invalid("resolves outside the endpoint"));
        }
        Ok(url)
    }

    /// Build a waiter backed by this client from the payload a mutating call returned.
    pub fn waiter(
        &self,
        initial: &Value,
    ) -> std::result::Result<CommonOperationWaiter<&Self>, ConversionError> {
        let mut waiter = CommonOperationWaiter::new(self);
        waiter.set_op(initial)?;
        Ok(waiter)
    }

    /// Most recent payload fetched for `name`, if any.
    pub async fn last_seen(&self, name: &str) -> Option<Value> {
        self.last_seen.read().await.get(name).cloned()
    }

    /// Drop the remembered payload for `name`, e.g. after giving up on a wait.
    pub async fn forget(&self, name: &str) {
        self.last_seen.write().await.remove(name);
    }

    async fn fetch(&self, name: &str) -> std::result::Result<Value, TransportError> {
        let url = self.operation_url(name)?;
        debug!("Fetching operation status from {url}");

        let mut request = self.http.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        let body = response.text().await.map_err(map_body_error)?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn failure(&self, name: &str, error: TransportError) -> QueryFailure<Value> {
        let failure = QueryFailure::new(error);
        match self.last_seen(name).await {
            Some(stale) => failure.with_payload(stale),
            None => failure,
        }
    }
}

#[async_trait]
impl OperationClient for HttpOperationClient {
    async fn get_operation(&self, name: &str) -> std::result::Result<Value, QueryFailure<Value>> {
        match self.fetch(name).await {
            Ok(payload) => {
                let mut last_seen = self.last_seen.write().await;
                if is_finished(&payload) {
                    last_seen.remove(name);
                } else {
                    last_seen.insert(name.to_string(), payload.clone());
                }
                Ok(payload)
            }
            Err(error) => {
                warn!("Operation lookup for {name} failed: {error}");
                Err(self.failure(name, error).await)
            }
        }
    }
}

fn is_finished(payload: &Value) -> bool {
    payload.get("done").and_then(Value::as_bool).unwrap_or(false)
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() || error.is_body() || error.is_request() {
        TransportError::Connection(error.to_string())
    } else if error.is_decode() {
        TransportError::Decode(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

/// Reading the body only fails when the stream breaks; malformed JSON is
/// caught afterwards by serde.
fn map_body_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}

async fn status_error(status: StatusCode, response: Response) -> TransportError {
    let body = response.text().await.unwrap_or_default();
    TransportError::status(status.as_u16(), error_message(status, &body))
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let ErrorBody { message, status } = envelope.error;
        return match status {
            Some(code) if !message.is_empty() => format!("{code}: {message}"),
            Some(code) => code,
            None => message,
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn client(endpoint: &str) -> HttpOperationClient {
        HttpOperationClient::builder()
            .endpoint(endpoint)
            .build()
            .unwrap()
    }

    #[rstest]
    #[case("https://example.com/v1", "operations/abc", "https://example.com/v1/operations/abc")]
    #[case("https://example.com/v1/", "/operations/abc", "https://example.com/v1/operations/abc")]
    #[case("https://example.com", "operations/a.b-c", "https://example.com/operations/a.b-c")]
    fn test_operation_url_joins_under_endpoint(
        #[case] endpoint: &str,
        #[case] name: &str,
        #[case] expected: &str,
    ) {
        let url = client(endpoint).operation_url(name).unwrap();
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case("https://attacker.example/steal")]
    #[case("http://cloudresourcemanager.googleapis.com/v1/operations/abc")]
    #[case("mailto:ops@example.com")]
    fn test_operation_url_rejects_absolute_names(#[case] name: &str) {
        let err = client("https://cloudresourcemanager.googleapis.com/v1")
            .operation_url(name)
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)), "{err}");
        assert!(err.to_string().contains("absolute URLs are not allowed"));
    }

    #[rstest]
    #[case("../../other/v9/op")]
    #[case("../v2/operations/abc")]
    #[case("operations/../../v1beta/op")]
    #[case("//attacker.example/steal/..")]
    fn test_operation_url_stays_under_base_path(#[case] name: &str) {
        let client = client("https://cloudresourcemanager.googleapis.com/v1");
        match client.operation_url(name) {
            Ok(url) => {
                assert_eq!(url.origin(), client.base_url().origin());
                assert!(url.path().starts_with("/v1/"), "{url}");
            }
            Err(err) => assert!(matches!(err, TransportError::InvalidRequest(_)), "{err}"),
        }
    }

    #[test]
    fn test_operation_url_rejects_parent_traversal() {
        let err = client("https://cloudresourcemanager.googleapis.com/v1")
            .operation_url("../../other/v9/op")
            .unwrap_err();
        assert!(err.to_string().contains("resolves outside the endpoint"), "{err}");
    }

    #[rstest]
    #[case(serde_json::json!({ "name": "operations/a", "done": true }), true)]
    #[case(serde_json::json!({ "name": "operations/a", "done": false }), false)]
    #[case(serde_json::json!({ "name": "operations/a" }), false)]
    #[case(serde_json::json!({ "name": "operations/a", "done": "yes" }), false)]
    fn test_is_finished(#[case] payload: Value, #[case] expected: bool) {
        assert_eq!(is_finished(&payload), expected);
    }

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"error":{"code":403,"message":"The caller does not have permission","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, body),
            "PERMISSION_DENIED: The caller does not have permission"
        );
    }

    #[test]
    fn test_error_message_envelope_without_status() {
        let body = r#"{"error":{"message":"quota exceeded"}}"#;
        assert_eq!(error_message(StatusCode::TOO_MANY_REQUESTS, body), "quota exceeded");
    }

    #[rstest]
    #[case("  upstream unavailable \n", "upstream unavailable")]
    #[case("", "Service Unavailable")]
    fn test_error_message_fallbacks(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(error_message(StatusCode::SERVICE_UNAVAILABLE, body), expected);
    }

    #[tokio::test]
    async fn test_waiter_takes_initial_payload() {
        let client = client("https://example.com/v1");
        let waiter = client
            .waiter(&serde_json::json!({ "name": "operations/abc", "done": false }))
            .unwrap();
        assert_eq!(waiter.op_name(), "operations/abc");
        assert!(client.last_seen("operations/abc").await.is_none());
    }

    #[test]
    fn test_waiter_rejects_malformed_initial_payload() {
        let client = client("https://example.com/v1");
        assert!(client.waiter(&serde_json::json!({ "done": "soon" })).is_err());
    }
}
