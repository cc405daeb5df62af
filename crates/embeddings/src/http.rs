//! Shared HTTP plumbing for the remote adapters.

use crate::error::{EmbeddingError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 300;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .user_agent(concat!("semindex/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| EmbeddingError::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

/// Classify a transport-level failure
pub(crate) fn send_error(provider: &str, err: &reqwest::Error) -> EmbeddingError {
    if err.is_decode() {
        EmbeddingError::invalid_response(provider, err)
    } else {
        EmbeddingError::unavailable(provider, err)
    }
}

/// Classify a non-success HTTP status
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> EmbeddingError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    if status.is_server_error() {
        EmbeddingError::Unavailable {
            provider: provider.to_string(),
            reason: format!("HTTP {}: {body}", status.as_u16()),
        }
    } else {
        EmbeddingError::Rejected {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        }
    }
}

/// Send a prepared request and decode a JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let response = request.send().await.map_err(|e| send_error(provider, &e))?;
    let status = response.status();
    let text = response.text().await.map_err(|e| send_error(provider, &e))?;
    if !status.is_success() {
        log::warn!("{provider} embedding request failed with HTTP {status}");
        return Err(status_error(provider, status, &text));
    }
    serde_json::from_str(&text).map_err(|e| EmbeddingError::invalid_response(provider, e))
}
