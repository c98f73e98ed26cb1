//! # Content Fetching
//!
//! The small port the pipeline uses to turn an article URL into HTML text.
//! All network failures, non-2xx responses, and timeouts collapse into a
//! single [`FetchFailed`] error that aborts only the one post, never the
//! surrounding run.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// The single failure class of the fetch port.
#[derive(Error, Debug)]
#[error("failed to fetch {url}: {cause}")]
pub struct FetchFailed {
    pub url: String,
    pub cause: String,
    /// Whether the failure is worth retrying (timeout, connection error,
    /// 408/429/5xx).
    pub transient: bool,
}

/// Fetches a URL into HTML text.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailed>;
}

/// The production fetcher: a shared `reqwest` client with a per-request
/// deadline.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailed> {
        debug!(%url, "fetching content");
        let response = self.client.get(url).send().await.map_err(|err| FetchFailed {
            url: url.to_string(),
            cause: err.to_string(),
            // Network-level failures are all considered retryable.
            transient: true,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailed {
                url: url.to_string(),
                cause: format!("unexpected status {status}"),
                transient: status.as_u16() == 408
                    || status.as_u16() == 429
                    || status.is_server_error(),
            });
        }

        response.text().await.map_err(|err| FetchFailed {
            url: url.to_string(),
            cause: format!("failed to read response body: {err}"),
            transient: true,
        })
    }
}
