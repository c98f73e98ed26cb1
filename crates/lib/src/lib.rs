//! # blogwatch
//!
//! An automated intelligence pipeline over a technical blog feed. The
//! engine discovers new posts from an RSS/Atom feed (with an HTML index
//! fallback), extracts clean article text, asks an LLM for a structured
//! summary of each post, indexes those summaries in a retrieval corpus, and
//! answers free-form questions grounded in the retrieved summaries.
//!
//! The interesting parts live in:
//! - [`pipeline`]: the staged, bounded-concurrency ingest run.
//! - [`backend`]: one retrieval contract, two interchangeable backends.
//! - [`feed`]: tolerant Atom / RSS 2.0 / HTML-index parsing.
//! - [`qa`] + [`cache`]: retrieve-then-ground answering behind a cached,
//!   single-flight overlay.

pub mod backend;
pub mod cache;
pub mod config;
pub mod constants;
pub mod errors;
pub mod extract;
pub mod feed;
pub mod fetch;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod qa;
pub mod retry;
pub mod session;
pub mod state;
pub mod summarizer;
pub mod types;

pub use errors::ProviderError;
pub use qa::{QaResponse, QaService};
pub use summarizer::Summarizer;
pub use types::{IngestionResult, Post, RawContent, RetrievedDoc, Summary};

use crate::backend::{create_backend, BackendError, RetrievalBackend};
use crate::config::AppConfig;
use crate::fetch::{ContentFetcher, FetchFailed, HttpFetcher};
use crate::pipeline::{run_ingestion, PipelineError, PipelineOptions};
use crate::providers::ai::AiProvider;
use crate::providers::factory::create_provider;
use crate::state::{open_state_store, StateError, StateStore};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by [`BlogAgent`] construction and its entry points.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("agent is missing a component: {0}")]
    MissingComponent(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("failed to fetch feed: {0}")]
    FeedFetch(#[from] FetchFailed),
}

/// The assembled ingestion engine: a fetcher, a summarizer, a retrieval
/// backend, and a state store, wired once from configuration. Each ingest
/// call borrows these components for its duration and owns nothing beyond
/// it.
pub struct BlogAgent {
    fetcher: Box<dyn ContentFetcher>,
    summarizer: Arc<Summarizer>,
    backend: Arc<dyn RetrievalBackend>,
    state_store: Box<dyn StateStore>,
    options: PipelineOptions,
    feed_url: String,
    feed_name: String,
}

impl BlogAgent {
    /// Creates a new `BlogAgentBuilder`.
    pub fn builder() -> BlogAgentBuilder {
        BlogAgentBuilder::default()
    }

    /// Assembles the full engine from configuration: provider, backend, and
    /// state store are each selected here, exactly once.
    pub fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        let provider = create_provider(&config.llm, config.llm_timeout)?;
        let backend = create_backend(config)?;
        let state_store = open_state_store(&config.state_path)?;
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;

        BlogAgent::builder()
            .fetcher(Box::new(fetcher))
            .ai_provider(provider, config.llm_summary_budget_chars)
            .backend(backend)
            .state_store(state_store)
            .pipeline_options(config.pipeline_options())
            .feed(config.feed_url.clone(), config.feed_name.clone())
            .build()
    }

    /// Runs one ingest pass over an already-fetched feed document.
    pub async fn ingest_feed(&self, feed_text: &str) -> Result<IngestionResult, AgentError> {
        let result = run_ingestion(
            feed_text,
            &self.feed_name,
            self.fetcher.as_ref(),
            &self.summarizer,
            self.backend.as_ref(),
            self.state_store.as_ref(),
            &self.options,
        )
        .await?;
        Ok(result)
    }

    /// Fetches the configured feed URL and runs one ingest pass over it.
    pub async fn ingest_from_url(&self) -> Result<IngestionResult, AgentError> {
        let feed_text = self.fetcher.fetch(&self.feed_url).await?;
        self.ingest_feed(&feed_text).await
    }

    /// The shared retrieval backend, for wiring a [`QaService`] next to the
    /// agent.
    pub fn backend(&self) -> Arc<dyn RetrievalBackend> {
        Arc::clone(&self.backend)
    }

    /// The shared summarizer, for wiring a [`QaService`] next to the agent.
    pub fn summarizer(&self) -> Arc<Summarizer> {
        Arc::clone(&self.summarizer)
    }
}

/// A builder for [`BlogAgent`] instances, for callers that assemble
/// components themselves (tests, alternative wiring).
#[derive(Default)]
pub struct BlogAgentBuilder {
    fetcher: Option<Box<dyn ContentFetcher>>,
    summarizer: Option<Summarizer>,
    backend: Option<Arc<dyn RetrievalBackend>>,
    state_store: Option<Box<dyn StateStore>>,
    options: Option<PipelineOptions>,
    feed_url: Option<String>,
    feed_name: Option<String>,
}

impl BlogAgentBuilder {
    pub fn fetcher(mut self, fetcher: Box<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Wraps an AI provider in a [`Summarizer`] with the given prompt
    /// budget.
    pub fn ai_provider(mut self, provider: Box<dyn AiProvider>, budget_chars: usize) -> Self {
        self.summarizer = Some(Summarizer::new(provider, budget_chars));
        self
    }

    pub fn summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn RetrievalBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn state_store(mut self, state_store: Box<dyn StateStore>) -> Self {
        self.state_store = Some(state_store);
        self
    }

    pub fn pipeline_options(mut self, options: PipelineOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn feed(mut self, feed_url: String, feed_name: String) -> Self {
        self.feed_url = Some(feed_url);
        self.feed_name = Some(feed_name);
        self
    }

    /// Builds the agent, or reports the first missing component.
    pub fn build(self) -> Result<BlogAgent, AgentError> {
        let fetcher = self
            .fetcher
            .ok_or(AgentError::MissingComponent("fetcher"))?;
        let summarizer = self
            .summarizer
            .ok_or(AgentError::MissingComponent("summarizer"))?;
        let backend = self
            .backend
            .ok_or(AgentError::MissingComponent("backend"))?;
        let state_store = self
            .state_store
            .ok_or(AgentError::MissingComponent("state store"))?;

        Ok(BlogAgent {
            fetcher,
            summarizer: Arc::new(summarizer),
            backend,
            state_store,
            options: self.options.unwrap_or_default(),
            feed_url: self.feed_url.unwrap_or_default(),
            feed_name: self
                .feed_name
                .unwrap_or_else(|| constants::DEFAULT_FEED_NAME.to_string()),
        })
    }
}
