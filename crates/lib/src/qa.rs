//! # QA Orchestration
//!
//! The answer path: retrieve relevant summaries, refuse when there is
//! nothing to ground on, otherwise ask the model to answer strictly from
//! the retrieved context. [`QaService`] wraps the orchestrator with the
//! response cache, single-flight coalescing, and the session log.

use crate::backend::{BackendError, RetrievalBackend};
use crate::cache::{CacheKey, Computed, SingleFlightCache};
use crate::constants::REFUSAL_NO_CONTEXT;
use crate::errors::ProviderError;
use crate::session::SessionTracker;
use crate::summarizer::Summarizer;
use crate::types::RetrievedDoc;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Failures of one QA call. Failed calls are never cached and never logged
/// to a session.
#[derive(Error, Debug)]
pub enum QaError {
    #[error("retrieval failed: {0}")]
    Backend(#[from] BackendError),

    #[error("answer synthesis failed: {0}")]
    Provider(#[from] ProviderError),

    /// The same failure, observed through the single-flight table by a
    /// caller that shared the computation.
    #[error("{0}")]
    Shared(Arc<QaError>),
}

/// A served answer plus the documents it was grounded in.
#[derive(Debug, Clone, PartialEq)]
pub struct QaResponse {
    pub answer: String,
    pub docs: Vec<RetrievedDoc>,
}

impl QaResponse {
    fn refusal() -> Self {
        Self {
            answer: REFUSAL_NO_CONTEXT.to_string(),
            docs: Vec::new(),
        }
    }

    /// Whether this response is the fixed no-context refusal.
    pub fn is_refusal(&self) -> bool {
        self.answer == REFUSAL_NO_CONTEXT
    }
}

/// Answers one question: retrieve up to `k` docs, refuse on empty
/// retrieval without calling the model, otherwise synthesize a grounded
/// answer. No reranking and no truncation happen here.
pub async fn answer_question(
    backend: &dyn RetrievalBackend,
    summarizer: &Summarizer,
    question: &str,
    k: usize,
) -> Result<QaResponse, QaError> {
    if question.trim().is_empty() {
        return Ok(QaResponse::refusal());
    }

    let docs = backend.retrieve(question, k).await?;
    if docs.is_empty() {
        info!(question, "retrieval returned nothing, refusing");
        return Ok(QaResponse::refusal());
    }

    debug!(question, docs = docs.len(), "synthesizing grounded answer");
    let answer = summarizer.answer(question, &docs).await?;
    Ok(QaResponse { answer, docs })
}

/// Configuration for the QA overlay.
#[derive(Debug, Clone)]
pub struct QaServiceOptions {
    pub cache_max_size: usize,
    pub cache_ttl: Duration,
    pub session_ttl: Duration,
    pub session_log_max: usize,
}

/// The process-wide QA entry point: cache, single-flight, and session log
/// over the orchestrator. Constructed once at startup and shared.
pub struct QaService {
    backend: Arc<dyn RetrievalBackend>,
    summarizer: Arc<Summarizer>,
    cache: SingleFlightCache<QaResponse, QaError>,
    sessions: SessionTracker,
}

impl QaService {
    pub fn new(
        backend: Arc<dyn RetrievalBackend>,
        summarizer: Arc<Summarizer>,
        options: QaServiceOptions,
    ) -> Self {
        Self {
            backend,
            summarizer,
            cache: SingleFlightCache::new(options.cache_max_size, options.cache_ttl),
            sessions: SessionTracker::new(options.session_ttl, options.session_log_max),
        }
    }

    /// Serves one question, going through the cache. Concurrent duplicate
    /// questions share a single retrieval and a single model call; the
    /// refusal for an empty question or empty retrieval is served but never
    /// cached. A present `session_id` gets the served response appended to
    /// its query log.
    pub async fn ask(
        &self,
        question: &str,
        k: usize,
        session_id: Option<&str>,
    ) -> Result<QaResponse, QaError> {
        let key = CacheKey::new(question, k);
        if key.question().is_empty() {
            let response = QaResponse::refusal();
            self.log_to_session(session_id, question, &response);
            return Ok(response);
        }

        let backend = Arc::clone(&self.backend);
        let summarizer = Arc::clone(&self.summarizer);
        let owned_question = question.to_string();

        let result = self
            .cache
            .get_or_compute(key, move || {
                async move {
                    let response =
                        answer_question(backend.as_ref(), &summarizer, &owned_question, k).await?;
                    let cacheable = !response.is_refusal();
                    Ok(Computed {
                        value: response,
                        cacheable,
                    })
                }
                .boxed()
            })
            .await;

        match result {
            Ok(response) => {
                self.log_to_session(session_id, question, &response);
                Ok(response)
            }
            // The sole owner of the failure gets it back unwrapped.
            Err(shared) => Err(match Arc::try_unwrap(shared) {
                Ok(err) => err,
                Err(still_shared) => QaError::Shared(still_shared),
            }),
        }
    }

    fn log_to_session(&self, session_id: Option<&str>, question: &str, response: &QaResponse) {
        if let Some(session_id) = session_id {
            self.sessions.record(
                session_id,
                question,
                response.answer.chars().count(),
                response.docs.len(),
            );
        }
    }

    /// Read access to a session's query log (observational only).
    pub fn session_log(&self, session_id: &str) -> Vec<crate::session::SessionLogEntry> {
        self.sessions.log_for(session_id)
    }

    /// Number of cached responses, exposed for tests and diagnostics.
    pub fn cached_responses(&self) -> usize {
        self.cache.len()
    }
}
