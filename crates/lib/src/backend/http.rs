//! # Generic HTTP RAG Backend
//!
//! Speaks the plain JSON protocol of a self-hosted RAG service:
//! `POST {base}/add_doc` to index a document and `POST {base}/query` to
//! retrieve, with optional bearer authorization.

use crate::backend::{doc_from_parts, log_skipped, BackendError, RetrievalBackend};
use crate::types::{RetrievedDoc, Summary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Serialize)]
struct AddDocRequest<'a> {
    document: &'a str,
    doc_index: usize,
    doc_metadata: &'a Map<String, Value>,
    uuid: &'a str,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
    uuid: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Deserialize)]
struct QueryResult {
    page_content: Option<String>,
    score: Option<f64>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// Retrieval backend over a generic HTTP RAG service.
#[derive(Debug)]
pub struct HttpRagBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    corpus_id: String,
    doc_counter: AtomicUsize,
}

impl HttpRagBackend {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        corpus_id: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Http)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            corpus_id,
            doc_counter: AtomicUsize::new(0),
        })
    }

    async fn post_json<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(BackendError::Http)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RetrievalBackend for HttpRagBackend {
    async fn ingest(&self, summary: &Summary) -> Result<(), BackendError> {
        let document = summary.to_indexable_document();
        let metadata = summary.to_metadata();
        let request = AddDocRequest {
            document: &document,
            doc_index: self.doc_counter.fetch_add(1, Ordering::Relaxed),
            doc_metadata: &metadata,
            uuid: &self.corpus_id,
        };

        self.post_json("add_doc", &request).await?;
        info!(post_id = %summary.post_id, corpus_id = %self.corpus_id, "ingested document");
        Ok(())
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDoc>, BackendError> {
        let request = QueryRequest {
            question: query,
            uuid: &self.corpus_id,
            top_k: k,
        };

        let response: QueryResponse = self
            .post_json("query", &request)
            .await?
            .json()
            .await
            .map_err(BackendError::Http)?;

        let total = response.results.len();
        let mut docs: Vec<RetrievedDoc> = response
            .results
            .into_iter()
            .filter_map(|result| doc_from_parts(result.page_content, result.score, result.metadata))
            .collect();
        log_skipped("http", total, docs.len());
        docs.truncate(k);
        debug!(query, returned = docs.len(), "retrieval complete");
        Ok(docs)
    }
}
