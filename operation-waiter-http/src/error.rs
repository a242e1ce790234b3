use thiserror::Error;

/// Errors raised while configuring an [`HttpOperationClient`](crate::HttpOperationClient).
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HttpClientError>;
