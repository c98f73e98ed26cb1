//! # Application Configuration
//!
//! The configuration surface of the engine, loadable from an optional YAML
//! file layered under `BLOGWATCH_`-prefixed environment variables. Every
//! knob has a serde default, so an empty configuration is a valid one
//! (modulo the backend-specific endpoints, validated where the backend is
//! built).

use crate::constants;
use crate::pipeline::PipelineOptions;
use crate::qa::QaServiceOptions;
use crate::retry::RetryPolicy;
use config::{Config as ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// A configuration-loading failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Which retrieval backend implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Managed,
    Http,
}

/// The AI provider to summarize and answer with.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// `"gemini"`, or anything else for an OpenAI-compatible endpoint.
    pub provider: String,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_url: None,
            api_key: None,
            model_name: "gemini-2.0-flash".to_string(),
        }
    }
}

/// The full configuration surface.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// The feed to ingest.
    #[serde(default)]
    pub feed_url: String,
    /// Source label stamped on every discovered post.
    #[serde(default = "default_feed_name")]
    pub feed_name: String,

    /// Which retrieval backend to use.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Backend-specific corpus identifier.
    #[serde(default)]
    pub corpus_id: String,
    /// Object-store URI the managed indexer watches (managed backend).
    #[serde(default)]
    pub docs_bucket: Option<String>,
    /// Key prefix prepended to every object under `docs_bucket`.
    #[serde(default)]
    pub docs_prefix: String,
    /// Managed query API endpoint (managed backend).
    #[serde(default)]
    pub corpus_query_url: Option<String>,
    /// Base URL of the generic RAG service (http backend).
    #[serde(default)]
    pub http_rag_base_url: Option<String>,
    /// Optional bearer token for the generic RAG service.
    #[serde(default)]
    pub http_rag_api_key: Option<String>,

    /// The AI provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Character budget for article text embedded in the summary prompt.
    #[serde(default = "default_summary_budget")]
    pub llm_summary_budget_chars: usize,

    #[serde(with = "humantime_serde", default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_backend_timeout")]
    pub backend_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_llm_timeout")]
    pub llm_timeout: Duration,

    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_summarize_concurrency")]
    pub summarize_concurrency: usize,
    #[serde(default = "default_ingest_concurrency")]
    pub ingest_concurrency: usize,

    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub cache_ttl: Duration,
    #[serde(with = "humantime_serde", default = "default_session_ttl")]
    pub session_ttl: Duration,
    #[serde(default = "default_session_log_max")]
    pub session_log_max: usize,

    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(with = "humantime_serde", default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_retry_max_delay")]
    pub retry_max_delay: Duration,
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: f64,

    /// Local path or object-store URI for the state blob.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            feed_name: default_feed_name(),
            backend: default_backend(),
            corpus_id: String::new(),
            docs_bucket: None,
            docs_prefix: String::new(),
            corpus_query_url: None,
            http_rag_base_url: None,
            http_rag_api_key: None,
            llm: LlmConfig::default(),
            llm_summary_budget_chars: default_summary_budget(),
            fetch_timeout: default_fetch_timeout(),
            backend_timeout: default_backend_timeout(),
            llm_timeout: default_llm_timeout(),
            fetch_concurrency: default_fetch_concurrency(),
            summarize_concurrency: default_summarize_concurrency(),
            ingest_concurrency: default_ingest_concurrency(),
            cache_max_size: default_cache_max_size(),
            cache_ttl: default_cache_ttl(),
            session_ttl: default_session_ttl(),
            session_log_max: default_session_log_max(),
            history_max_entries: default_history_max_entries(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay: default_retry_base_delay(),
            retry_max_delay: default_retry_max_delay(),
            retry_multiplier: default_retry_multiplier(),
            retry_jitter: default_retry_jitter(),
            state_path: default_state_path(),
        }
    }
}

impl AppConfig {
    /// The retry policy described by the `retry_*` keys.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
            multiplier: self.retry_multiplier,
            jitter: self.retry_jitter,
        }
    }

    /// Pipeline tunables derived from the configuration.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            fetch_concurrency: self.fetch_concurrency,
            summarize_concurrency: self.summarize_concurrency,
            ingest_concurrency: self.ingest_concurrency,
            history_max_entries: self.history_max_entries,
            retry: self.retry_policy(),
        }
    }

    /// QA overlay tunables derived from the configuration.
    pub fn qa_options(&self) -> QaServiceOptions {
        QaServiceOptions {
            cache_max_size: self.cache_max_size,
            cache_ttl: self.cache_ttl,
            session_ttl: self.session_ttl,
            session_log_max: self.session_log_max,
        }
    }
}

/// Loads the configuration: an optional YAML file first, then
/// `BLOGWATCH_`-prefixed environment variables on top (nested keys use
/// `__`, e.g. `BLOGWATCH_LLM__API_KEY`).
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    if let Some(path) = config_path {
        info!(path, "loading configuration file");
        builder = builder.add_source(File::with_name(path));
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("BLOGWATCH")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

fn default_feed_name() -> String {
    constants::DEFAULT_FEED_NAME.to_string()
}
fn default_backend() -> BackendKind {
    BackendKind::Http
}
fn default_summary_budget() -> usize {
    constants::DEFAULT_SUMMARY_BUDGET_CHARS
}
fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_backend_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_llm_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_fetch_concurrency() -> usize {
    constants::DEFAULT_FETCH_CONCURRENCY
}
fn default_summarize_concurrency() -> usize {
    constants::DEFAULT_SUMMARIZE_CONCURRENCY
}
fn default_ingest_concurrency() -> usize {
    constants::DEFAULT_INGEST_CONCURRENCY
}
fn default_cache_max_size() -> usize {
    constants::DEFAULT_CACHE_MAX_SIZE
}
fn default_cache_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}
fn default_session_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
fn default_session_log_max() -> usize {
    constants::DEFAULT_SESSION_LOG_MAX
}
fn default_history_max_entries() -> usize {
    constants::DEFAULT_HISTORY_MAX_ENTRIES
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay() -> Duration {
    Duration::from_millis(500)
}
fn default_retry_max_delay() -> Duration {
    Duration::from_secs(10)
}
fn default_retry_multiplier() -> f64 {
    2.0
}
fn default_retry_jitter() -> f64 {
    0.2
}
fn default_state_path() -> String {
    constants::DEFAULT_STATE_PATH.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = AppConfig::default();
        assert_eq!(config.backend, BackendKind::Http);
        assert_eq!(config.llm_summary_budget_chars, 4000);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.backend_timeout, Duration::from_secs(30));
        assert_eq!(config.fetch_concurrency, 8);
        assert_eq!(config.summarize_concurrency, 4);
        assert_eq!(config.ingest_concurrency, 4);
        assert_eq!(config.cache_max_size, 1000);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.session_ttl, Duration::from_secs(86400));
        assert_eq!(config.session_log_max, 50);
        assert_eq!(config.history_max_entries, 10);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
    }

    #[test]
    fn retry_policy_mirrors_the_retry_keys() {
        let mut config = AppConfig::default();
        config.retry_max_attempts = 5;
        config.retry_jitter = 0.0;
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.jitter, 0.0);
        assert_eq!(policy.multiplier, 2.0);
    }
}
