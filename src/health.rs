//! Backend liveness probe.
//!
//! The conversion service answers `GET /` with `{"message": "..."}` while it
//! is up. [`check_backend`] is independent of any session and never touches
//! a [`crate::session::Session`].

use crate::config::ClientConfig;
use crate::error::DeepDocError;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Greeting {
    message: String,
}

/// Ask the service whether it is running; returns its greeting.
pub async fn check_backend(config: &ClientConfig) -> Result<String, DeepDocError> {
    let url = config.base_url()?;
    let unreachable = |reason: String| DeepDocError::BackendUnreachable {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| DeepDocError::HttpClient(e.to_string()))?;

    debug!("Probing {}", url);
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(unreachable(format!("HTTP {status}")));
    }

    let greeting: Greeting = response
        .json()
        .await
        .map_err(|e| unreachable(format!("unexpected response body: {e}")))?;

    info!("Backend at {} is up: {}", url, greeting.message);
    Ok(greeting.message)
}
