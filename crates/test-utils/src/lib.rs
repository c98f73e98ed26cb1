//! # Shared Test Utilities
//!
//! Mock implementations of the engine's ports (AI provider, content
//! fetcher, retrieval backend, state store) plus small fixture helpers.
//! These keep integration tests isolated and repeatable without touching
//! the network.

use async_trait::async_trait;
use blogwatch::backend::{BackendError, RetrievalBackend};
use blogwatch::errors::ProviderError;
use blogwatch::fetch::{ContentFetcher, FetchFailed};
use blogwatch::providers::ai::AiProvider;
use blogwatch::state::{AppState, StateError, StateStore};
use blogwatch::types::{RetrievedDoc, Summary};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- Mock AI Provider ---

/// A scriptable AI provider. Responses are keyed by a substring matched
/// against either prompt; unmatched calls fall back to the default
/// response, or fail when none is set. Every call is recorded.
#[derive(Clone, Debug, Default)]
pub struct MockAiProvider {
    keyed_responses: Arc<Mutex<Vec<(String, String)>>>,
    default_response: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-programs a response for any prompt containing `needle`.
    pub fn add_response(&self, needle: &str, response: &str) {
        self.keyed_responses
            .lock()
            .unwrap()
            .push((needle.to_string(), response.to_string()));
    }

    /// Sets the fallback response for prompts no key matches.
    pub fn set_default_response(&self, response: &str) {
        *self.default_response.lock().unwrap() = Some(response.to_string());
    }

    /// The recorded `(system_prompt, user_prompt)` pairs, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let keyed = self.keyed_responses.lock().unwrap();
        for (needle, response) in keyed.iter() {
            if user_prompt.contains(needle) || system_prompt.contains(needle) {
                return Ok(response.clone());
            }
        }
        drop(keyed);

        if let Some(response) = self.default_response.lock().unwrap().clone() {
            return Ok(response);
        }

        Err(ProviderError::Api {
            status: 500,
            body: format!("MockAiProvider: no response programmed for prompt: '{user_prompt}'"),
        })
    }
}

/// A valid summary-JSON response body for [`MockAiProvider`], long enough
/// to satisfy the summary length invariants.
pub fn summary_json(topic: &str) -> String {
    format!(
        r#"{{
  "executive_summary": "An executive look at {topic} for busy readers.",
  "technical_summary": "A sufficiently detailed technical description of {topic}, covering its design, trade-offs, and measured results in depth.",
  "bullet_points": ["{topic} point one", "{topic} point two"],
  "keywords": ["{topic}", "Engineering"]
}}"#
    )
}

// --- Mock Content Fetcher ---

/// An in-memory fetcher serving pre-registered pages, with optional
/// scripted failures to exercise retry behavior.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, (usize, bool)>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    /// Makes the next `times` fetches of `url` fail before any registered
    /// page is served.
    pub fn fail_next(&self, url: &str, times: usize, transient: bool) {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), (times, transient));
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailed> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut failures = self.failures.lock().unwrap();
        if let Some((remaining, transient)) = failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                let transient = *transient;
                return Err(FetchFailed {
                    url: url.to_string(),
                    cause: "scripted failure".to_string(),
                    transient,
                });
            }
        }
        drop(failures);

        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchFailed {
                url: url.to_string(),
                cause: "no page registered".to_string(),
                transient: false,
            })
    }
}

// --- In-memory Retrieval Backend ---

/// A retrieval backend that stores summaries in memory. Retrieval serves
/// pre-programmed docs (or docs derived from ingested summaries) truncated
/// to `k`, and counts its calls for single-flight assertions.
#[derive(Default)]
pub struct MemoryBackend {
    ingested: Mutex<Vec<Summary>>,
    canned_docs: Mutex<Vec<RetrievedDoc>>,
    ingest_failures: Mutex<HashMap<String, (usize, u16)>>,
    retrieve_failures: Mutex<Option<(usize, u16)>>,
    retrieve_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs the docs returned by `retrieve`.
    pub fn set_docs(&self, docs: Vec<RetrievedDoc>) {
        *self.canned_docs.lock().unwrap() = docs;
    }

    /// Makes the next `times` ingests of `post_id` fail with `status`.
    pub fn fail_ingest(&self, post_id: &str, times: usize, status: u16) {
        self.ingest_failures
            .lock()
            .unwrap()
            .insert(post_id.to_string(), (times, status));
    }

    /// Makes the next `times` retrieve calls fail with `status`.
    pub fn fail_retrieve(&self, times: usize, status: u16) {
        *self.retrieve_failures.lock().unwrap() = Some((times, status));
    }

    /// Summaries currently held, in ingest order (re-ingests replace).
    pub fn ingested(&self) -> Vec<Summary> {
        self.ingested.lock().unwrap().clone()
    }

    pub fn retrieve_call_count(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalBackend for MemoryBackend {
    async fn ingest(&self, summary: &Summary) -> Result<(), BackendError> {
        let mut failures = self.ingest_failures.lock().unwrap();
        if let Some((remaining, status)) = failures.get_mut(&summary.post_id) {
            if *remaining > 0 {
                *remaining -= 1;
                let status = *status;
                return Err(BackendError::Api {
                    status,
                    body: "scripted ingest failure".to_string(),
                });
            }
        }
        drop(failures);

        let mut ingested = self.ingested.lock().unwrap();
        ingested.retain(|existing| existing.post_id != summary.post_id);
        ingested.push(summary.clone());
        Ok(())
    }

    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RetrievedDoc>, BackendError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);

        let mut failures = self.retrieve_failures.lock().unwrap();
        if let Some((remaining, status)) = failures.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                let status = *status;
                return Err(BackendError::Api {
                    status,
                    body: "scripted retrieve failure".to_string(),
                });
            }
        }
        drop(failures);

        let mut docs = self.canned_docs.lock().unwrap().clone();
        docs.truncate(k);
        Ok(docs)
    }
}

// --- In-memory State Store ---

/// A state store backed by process memory, for pipeline tests.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<AppState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AppState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<AppState, StateError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn save(&self, state: &AppState) -> Result<(), StateError> {
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }
}

// --- Fixture helpers ---

/// A well-formed retrieval doc for QA tests.
pub fn retrieved_doc(post_id: &str, title: &str, url: &str, score: f64) -> RetrievedDoc {
    let mut metadata = serde_json::Map::new();
    metadata.insert("post_id".to_string(), serde_json::json!(post_id));
    metadata.insert("title".to_string(), serde_json::json!(title));
    metadata.insert("url".to_string(), serde_json::json!(url));
    RetrievedDoc {
        post_id: post_id.to_string(),
        title: title.to_string(),
        url: url.to_string(),
        snippet: format!("Snippet for {title}."),
        score,
        metadata,
    }
}
