//! # Shared Constants
//!
//! Centralized defaults and fixed strings shared across the `blogwatch`
//! workspace. Using these constants avoids "magic values" drifting apart
//! between the pipeline, the QA layer, and the configuration surface.

/// The fixed response returned when retrieval produces no blog context.
pub const REFUSAL_NO_CONTEXT: &str =
    "I could not find any blog content relevant to that question, so I cannot answer it.";

/// Default number of documents requested from the retrieval backend.
pub const DEFAULT_RETRIEVE_K: usize = 8;

/// Default source label stamped on discovered posts.
pub const DEFAULT_FEED_NAME: &str = "blog";

/// Default character budget for article text embedded in the summary prompt.
pub const DEFAULT_SUMMARY_BUDGET_CHARS: usize = 4000;

/// Default bound on concurrent article fetches.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Default bound on concurrent summarization calls.
pub const DEFAULT_SUMMARIZE_CONCURRENCY: usize = 4;

/// Default bound on concurrent backend ingest calls.
pub const DEFAULT_INGEST_CONCURRENCY: usize = 4;

/// Default cap on retained ingestion-run history entries.
pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 10;

/// Default capacity of the QA response cache.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 1000;

/// Default cap on retained per-session query-log entries.
pub const DEFAULT_SESSION_LOG_MAX: usize = 50;

/// Default location of the durable pipeline state blob.
pub const DEFAULT_STATE_PATH: &str = "state/blogwatch_state.json";
