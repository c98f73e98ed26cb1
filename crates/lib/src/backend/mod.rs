//! # Retrieval Backend Port
//!
//! The one contract the engine has with its retrieval layer:
//! `ingest(summary)` makes a summary retrievable, `retrieve(query, k)` finds
//! the most relevant indexed summaries. Two interchangeable implementations
//! exist, a managed vector corpus fed through an object store and a generic
//! HTTP RAG service, and the choice is made exactly once, from
//! configuration, at construction time.

pub mod http;
pub mod managed;

pub use http::HttpRagBackend;
pub use managed::ManagedCorpusBackend;

use crate::config::{AppConfig, BackendKind};
use crate::types::{clamp_score, post_id_for_url, RetrievedDoc, Summary};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised by retrieval backends.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("object store operation failed: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("failed to serialize document payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether the failure is worth retrying under the retry policy:
    /// timeouts and connection failures, 408/429/5xx, and object-store
    /// failures other than "not found".
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            BackendError::Api { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            BackendError::ObjectStore(err) => {
                !matches!(err, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

/// The retrieval backend contract.
///
/// Ingest is idempotent by post id: re-ingesting a summary whose id is
/// already present must never produce a duplicate retrievable document.
/// Retrieve returns at most `k` docs with scores clamped into `[0, 1]`;
/// malformed entries are skipped, not raised.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn ingest(&self, summary: &Summary) -> Result<(), BackendError>;
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDoc>, BackendError>;
}

/// Constructs the configured backend. This is the only place in the crate
/// that knows which implementations exist.
pub fn create_backend(config: &AppConfig) -> Result<Arc<dyn RetrievalBackend>, BackendError> {
    match config.backend {
        BackendKind::Http => {
            let base_url = config.http_rag_base_url.clone().ok_or_else(|| {
                BackendError::Config("http_rag_base_url is required for the http backend".into())
            })?;
            Ok(Arc::new(HttpRagBackend::new(
                base_url,
                config.http_rag_api_key.clone(),
                config.corpus_id.clone(),
                config.backend_timeout,
            )?))
        }
        BackendKind::Managed => Ok(Arc::new(ManagedCorpusBackend::from_config(config)?)),
    }
}

/// Assembles one retrieval result from a backend response entry.
///
/// Entries missing a url, title, or snippet are malformed and dropped; a
/// missing post id is recovered by hashing the url (the id is a pure
/// function of the url by contract). Scores are clamped on the way in.
pub(crate) fn doc_from_parts(
    snippet: Option<String>,
    score: Option<f64>,
    metadata: Map<String, Value>,
) -> Option<RetrievedDoc> {
    let snippet = snippet.filter(|snippet| !snippet.trim().is_empty())?;
    let title = metadata_string(&metadata, "title")?;
    let url = metadata_string(&metadata, "url")?;
    let post_id =
        metadata_string(&metadata, "post_id").unwrap_or_else(|| post_id_for_url(&url));

    Some(RetrievedDoc {
        post_id,
        title,
        url,
        snippet,
        score: clamp_score(score.unwrap_or(0.0)),
        metadata,
    })
}

fn metadata_string(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn log_skipped(kind: &str, total: usize, kept: usize) {
    if kept < total {
        debug!(
            backend = kind,
            skipped = total - kept,
            "dropped malformed retrieval entries"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(title: Option<&str>, url: Option<&str>) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(title) = title {
            map.insert("title".into(), json!(title));
        }
        if let Some(url) = url {
            map.insert("url".into(), json!(url));
        }
        map
    }

    #[test]
    fn drops_entries_missing_required_fields() {
        let full = metadata(Some("T"), Some("https://example.org/a"));
        assert!(doc_from_parts(Some("snippet".into()), Some(0.5), full).is_some());

        let no_title = metadata(None, Some("https://example.org/a"));
        assert!(doc_from_parts(Some("snippet".into()), Some(0.5), no_title).is_none());

        let no_url = metadata(Some("T"), None);
        assert!(doc_from_parts(Some("snippet".into()), Some(0.5), no_url).is_none());

        let full = metadata(Some("T"), Some("https://example.org/a"));
        assert!(doc_from_parts(Some("   ".into()), Some(0.5), full).is_none());
    }

    #[test]
    fn recovers_post_id_from_url() {
        let doc = doc_from_parts(
            Some("snippet".into()),
            Some(0.5),
            metadata(Some("T"), Some("https://example.org/a")),
        )
        .expect("doc is well-formed");
        assert_eq!(doc.post_id, post_id_for_url("https://example.org/a"));
    }

    #[test]
    fn clamps_scores_on_ingress() {
        let doc = doc_from_parts(
            Some("snippet".into()),
            Some(3.2),
            metadata(Some("T"), Some("https://example.org/a")),
        )
        .expect("doc is well-formed");
        assert_eq!(doc.score, 1.0);
    }
}
