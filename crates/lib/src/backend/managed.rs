//! # Managed Corpus Backend
//!
//! Ingestion writes two objects per summary into a bucket the managed
//! indexer watches: `{prefix}{post_id}.txt` with the indexable document and
//! `{prefix}{post_id}.metadata.json` with the metadata mapping. Indexing
//! itself is an external, observable side effect. Retrieval goes through
//! the managed query API keyed by corpus id.

use crate::backend::{doc_from_parts, log_skipped, BackendError, RetrievalBackend};
use crate::config::AppConfig;
use crate::types::{RetrievedDoc, Summary};
use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Serialize)]
struct CorpusQueryRequest<'a> {
    corpus_id: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct CorpusQueryResponse {
    #[serde(default)]
    contexts: Vec<CorpusContext>,
}

#[derive(Deserialize)]
struct CorpusContext {
    chunk_text: Option<String>,
    relevance_score: Option<f64>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// Retrieval backend over a managed vector corpus.
pub struct ManagedCorpusBackend {
    store: Arc<dyn ObjectStore>,
    docs_prefix: String,
    corpus_id: String,
    query_url: String,
    client: reqwest::Client,
}

impl ManagedCorpusBackend {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        docs_prefix: String,
        corpus_id: String,
        query_url: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Http)?;
        Ok(Self {
            store,
            docs_prefix,
            corpus_id,
            query_url,
            client,
        })
    }

    /// Builds the backend from configuration: the docs bucket URI selects
    /// and opens the object store, and `docs_prefix` is prepended to every
    /// object name.
    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        let bucket = config.docs_bucket.as_deref().ok_or_else(|| {
            BackendError::Config("docs_bucket is required for the managed backend".into())
        })?;
        let query_url = config.corpus_query_url.clone().ok_or_else(|| {
            BackendError::Config("corpus_query_url is required for the managed backend".into())
        })?;

        let url = Url::parse(bucket)
            .map_err(|err| BackendError::Config(format!("invalid docs_bucket '{bucket}': {err}")))?;
        let (store, base_path) = object_store::parse_url(&url)?;

        let mut docs_prefix = base_path.to_string();
        if !docs_prefix.is_empty() && !docs_prefix.ends_with('/') {
            docs_prefix.push('/');
        }
        docs_prefix.push_str(&config.docs_prefix);

        Self::new(
            Arc::from(store),
            docs_prefix,
            config.corpus_id.clone(),
            query_url,
            config.backend_timeout,
        )
    }

    fn document_path(&self, post_id: &str) -> ObjectPath {
        ObjectPath::from(format!("{}{post_id}.txt", self.docs_prefix))
    }

    fn metadata_path(&self, post_id: &str) -> ObjectPath {
        ObjectPath::from(format!("{}{post_id}.metadata.json", self.docs_prefix))
    }
}

#[async_trait]
impl RetrievalBackend for ManagedCorpusBackend {
    /// Writes both objects for the summary. Re-ingesting the same post id
    /// overwrites them in place, so the corpus never holds duplicates.
    async fn ingest(&self, summary: &Summary) -> Result<(), BackendError> {
        let document = summary.to_indexable_document();
        let metadata = serde_json::to_vec(&Value::Object(summary.to_metadata()))?;

        let doc_path = self.document_path(&summary.post_id);
        self.store
            .put(&doc_path, document.into_bytes().into())
            .await?;
        let meta_path = self.metadata_path(&summary.post_id);
        self.store.put(&meta_path, metadata.into()).await?;

        info!(post_id = %summary.post_id, location = %doc_path, "wrote corpus objects");
        Ok(())
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDoc>, BackendError> {
        let request = CorpusQueryRequest {
            corpus_id: &self.corpus_id,
            query,
            max_results: k,
        };

        let response = self
            .client
            .post(&self.query_url)
            .json(&request)
            .send()
            .await
            .map_err(BackendError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: CorpusQueryResponse =
            response.json().await.map_err(BackendError::Http)?;

        let total = response.contexts.len();
        let mut docs: Vec<RetrievedDoc> = response
            .contexts
            .into_iter()
            .filter_map(|context| {
                doc_from_parts(context.chunk_text, context.relevance_score, context.metadata)
            })
            .collect();
        log_skipped("managed", total, docs.len());
        docs.truncate(k);
        debug!(query, returned = docs.len(), "corpus query complete");
        Ok(docs)
    }
}
