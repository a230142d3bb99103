//! Remote manifest download

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use certchain_core::BackendError;

use crate::retry::{retry_with_backoff, RetryConfig};

/// Timeout for a single manifest download
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the HTTP client used for manifest downloads
pub fn http_client() -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(concat!("certchain/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BackendError::fetch("<client>", e.to_string()))
}

/// Download `url` as text, retrying transient failures.
///
/// 4xx responses mean the URL (usually the version in it) is wrong and are
/// returned without retrying.
pub async fn fetch_manifest(
    client: &reqwest::Client,
    url: &str,
    retry: &RetryConfig,
) -> Result<String, BackendError> {
    let body = retry_with_backoff(
        retry,
        "fetch-manifest",
        |e: &FetchFailure| e.retryable,
        || fetch_once(client, url),
    )
    .await
    .map_err(|e| BackendError::fetch(url, e.message))?;

    debug!(url = %url, bytes = body.len(), "fetched manifest");
    Ok(body)
}

#[derive(Debug)]
struct FetchFailure {
    message: String,
    retryable: bool,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Map a response status to a failure; 4xx is permanent, other errors transient
fn check_status(status: StatusCode) -> Result<(), FetchFailure> {
    if status.is_success() {
        return Ok(());
    }
    Err(FetchFailure {
        message: format!("HTTP {}", status),
        retryable: !status.is_client_error(),
    })
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<String, FetchFailure> {
    let response = client.get(url).send().await.map_err(|e| FetchFailure {
        message: e.to_string(),
        retryable: true,
    })?;

    check_status(response.status())?;
    response.text().await.map_err(|e| FetchFailure {
        message: e.to_string(),
        retryable: true,
    })
}
