//! Clients for the third-party APIs the backend relies on.
//!
//! Every call follows the same shape: check that the API key is configured,
//! issue a single request, reshape the JSON into local types. There are no
//! retries; failures are reported to the caller as a [`ServiceError`].

pub mod gemini;
pub mod maps;

pub use gemini::GeminiClient;
pub use maps::MapsClient;

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("missing api key: {0} is not set")]
    MissingApiKey(&'static str),
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("api error {status}: {message}")]
    Api { status: String, message: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("empty response: {0}")]
    EmptyResponse(String),
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else if e.is_decode() {
        ServiceError::Serde(e.to_string())
    } else {
        ServiceError::Transport(e.to_string())
    }
}

/// Build the shared HTTP client with a request timeout.
pub fn http_client(timeout: Duration) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("civic-incidents-backend/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ServiceError::Transport(e.to_string()))
}

/// Turn a non-2xx response into [`ServiceError::Http`].
pub(crate) async fn ensure_success(
    res: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ServiceError::Http {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}
