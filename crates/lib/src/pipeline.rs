//! # Ingestion Pipeline
//!
//! One ingest run: discover posts from the feed text, diff them against the
//! durable watermark, fetch-and-extract, summarize, ingest into the
//! retrieval backend, and commit. Each stage fans out with its own
//! concurrency bound so a slow dependency cannot starve another, and every
//! per-item failure is absorbed and counted rather than propagated.
//!
//! The pipeline borrows all of its collaborators for the duration of one
//! call and owns no persistent handles, which keeps runs reentrant. State
//! is committed in a single step at the very end; a run whose future is
//! dropped before that point has no observable effect.

use crate::backend::{BackendError, RetrievalBackend};
use crate::constants;
use crate::extract;
use crate::feed;
use crate::fetch::{ContentFetcher, FetchFailed};
use crate::retry::{retry, RetryPolicy};
use crate::state::{StateError, StateStore};
use crate::summarizer::{Summarizer, SummarizeError};
use crate::types::{IngestionResult, Post, RawContent, Summary};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

/// Tunables for one ingest run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Bound on concurrent article fetches.
    pub fetch_concurrency: usize,
    /// Bound on concurrent summarization calls.
    pub summarize_concurrency: usize,
    /// Bound on concurrent backend ingest calls.
    pub ingest_concurrency: usize,
    /// Cap on retained history entries.
    pub history_max_entries: usize,
    /// Retry policy applied to transient per-item failures.
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fetch_concurrency: constants::DEFAULT_FETCH_CONCURRENCY,
            summarize_concurrency: constants::DEFAULT_SUMMARIZE_CONCURRENCY,
            ingest_concurrency: constants::DEFAULT_INGEST_CONCURRENCY,
            history_max_entries: constants::DEFAULT_HISTORY_MAX_ENTRIES,
            retry: RetryPolicy::default(),
        }
    }
}

/// Failures that abort a whole run. Per-item failures never surface here;
/// they are absorbed into the run counts.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to load or persist pipeline state: {0}")]
    State(#[from] StateError),
}

/// Runs one full ingest pass over an already-fetched feed document and
/// commits the outcome. A run with zero ingested posts is still a
/// successful run and still commits a history entry.
pub async fn run_ingestion(
    feed_text: &str,
    source: &str,
    fetcher: &dyn ContentFetcher,
    summarizer: &Summarizer,
    backend: &dyn RetrievalBackend,
    state_store: &dyn StateStore,
    options: &PipelineOptions,
) -> Result<IngestionResult, PipelineError> {
    // Discover.
    let posts = feed::parse_feed(feed_text, source);
    let discovered_count = posts.len();

    // Diff against the watermark, preserving feed order. The index tags
    // each item so fan-in can reconstruct that order at commit time.
    let mut state = state_store.load().await?;
    let seen = state.seen_ids();
    let new_posts: Vec<(usize, Post)> = posts
        .into_iter()
        .filter(|post| !seen.contains(&post.id))
        .enumerate()
        .collect();
    let new_count = new_posts.len();
    info!(discovered_count, new_count, "feed diff complete");

    // Fetch and extract.
    let retry_policy = &options.retry;
    let raw_contents: Vec<(usize, RawContent)> = stream::iter(new_posts)
        .map(|(index, post)| async move {
            match obtain_content(&post, fetcher, retry_policy).await {
                Ok(raw) => Some((index, raw)),
                Err(err) => {
                    warn!(post_id = %post.id, url = %post.url, "dropping post from run: {err}");
                    None
                }
            }
        })
        .buffer_unordered(options.fetch_concurrency.max(1))
        .filter_map(|item| async move { item })
        .collect()
        .await;

    // Summarize.
    let summaries: Vec<(usize, Summary)> = stream::iter(raw_contents)
        .map(|(index, raw)| async move {
            let attempt = retry(retry_policy, |err: &SummarizeError| err.is_transient(), || {
                summarizer.summarize(&raw)
            })
            .await;
            match attempt {
                Ok(summary) => Some((index, summary)),
                Err(err) => {
                    warn!(post_id = %raw.post_id, "dropping post from run: {err}");
                    None
                }
            }
        })
        .buffer_unordered(options.summarize_concurrency.max(1))
        .filter_map(|item| async move { item })
        .collect()
        .await;
    let summarized_count = summaries.len();

    // Ingest.
    let mut ingested: Vec<(usize, String)> = stream::iter(summaries)
        .map(|(index, summary)| async move {
            let attempt = retry(retry_policy, |err: &BackendError| err.is_transient(), || {
                backend.ingest(&summary)
            })
            .await;
            match attempt {
                Ok(()) => Some((index, summary.post_id.clone())),
                Err(err) => {
                    warn!(post_id = %summary.post_id, "ingest failed, counting as loss: {err}");
                    None
                }
            }
        })
        .buffer_unordered(options.ingest_concurrency.max(1))
        .filter_map(|item| async move { item })
        .collect()
        .await;
    let ingested_count = ingested.len();

    // Commit. Fan-out scrambled completion order; sorting by the index
    // restores feed order so the run record is deterministic for its input.
    ingested.sort_by_key(|(index, _)| *index);
    let new_post_ids: Vec<String> = ingested.into_iter().map(|(_, id)| id).collect();

    let result = IngestionResult {
        discovered_count,
        new_count,
        summarized_count,
        ingested_count,
        new_post_ids: new_post_ids.clone(),
        ran_at: Utc::now(),
    };

    state.mark_seen(new_post_ids);
    state.record_result(result.clone(), options.history_max_entries);
    state_store.save(&state).await?;
    info!(
        discovered_count,
        new_count, summarized_count, ingested_count, "ingestion run committed"
    );

    Ok(result)
}

/// Obtains article content for a post: inline feed content when the parser
/// harvested it, otherwise a fetch (with retry) followed by extraction.
async fn obtain_content(
    post: &Post,
    fetcher: &dyn ContentFetcher,
    retry_policy: &RetryPolicy,
) -> Result<RawContent, FetchFailed> {
    if let Some(inline) = &post.inline_content {
        return Ok(extract::extract(post, inline));
    }

    let html = retry(retry_policy, |err: &FetchFailed| err.transient, || {
        fetcher.fetch(&post.url)
    })
    .await?;
    Ok(extract::extract(post, &html))
}
