//! Builder-style configuration for [`HttpOperationClient`].

use std::time::Duration;

use url::Url;

use crate::client::HttpOperationClient;
use crate::error::{HttpClientError, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub(crate) struct ClientConfig {
    pub endpoint: String,
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bearer_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!("operation-waiter/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    config: ClientConfig,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL that operation names are resolved against,
    /// e.g. `https://cloudresourcemanager.googleapis.com/v1`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// OAuth access token sent as `Authorization: Bearer ...`.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(token.into());
        self
    }

    /// Upper bound for a single status request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Parse and normalize the endpoint so relative operation names join under it.
    pub(crate) fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(self.config.endpoint.trim())?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.config.endpoint.trim().is_empty() {
            return Err(HttpClientError::Config("Endpoint is required".to_string()));
        }

        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpClientError::Config(format!(
                "Unsupported endpoint scheme '{}'",
                url.scheme()
            )));
        }

        if self.config.request_timeout.is_zero() {
            return Err(HttpClientError::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if matches!(&self.config.bearer_token, Some(token) if token.trim().is_empty()) {
            return Err(HttpClientError::Config("Bearer token is empty".to_string()));
        }

        Ok(())
    }

    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .user_agent(self.config.user_agent.clone())
            .build()?)
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build(self) -> Result<HttpOperationClient> {
        HttpOperationClient::from_builder(self)
    }
}
