//! # Core Data Model
//!
//! Typed records flowing through the ingestion and retrieval engine: feed
//! posts, fetched article bodies, structured summaries, retrieval results,
//! and the per-run ingestion record. All of them are created once at a
//! pipeline stage boundary and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use thiserror::Error;

/// Derives the stable post id for a URL: the hex-encoded SHA-256 of the
/// absolute URL string. Equal URLs always yield equal ids, across runs and
/// processes.
pub fn post_id_for_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Clamps a raw relevance score into `[0, 1]`. Non-finite values map to 0.
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// A discovered feed entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Stable id, a pure function of `url` (see [`post_id_for_url`]).
    pub id: String,
    pub url: String,
    pub title: String,
    /// Best-effort parsed publication timestamp; `None` when absent or
    /// unparseable.
    pub published_at: Option<DateTime<Utc>>,
    /// Ordered tag labels, trimmed; case preserved.
    pub tags: Vec<String>,
    /// Label of the feed the post was discovered from.
    pub source: String,
    /// Raw HTML harvested from the feed itself, when the feed carried it.
    pub inline_content: Option<String>,
}

/// A fetched and extracted article body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawContent {
    pub post_id: String,
    pub url: String,
    pub title: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    /// The original page markup, unchanged.
    pub html: String,
    /// Cleaned plain text; never empty (the post title substitutes when the
    /// page yields no visible text).
    pub text: String,
    /// Ordered `"{heading}\n\n{paragraphs}"` blocks; may be empty.
    pub sections: Vec<String>,
}

/// Rejections from [`Summary::new`]. These guard invariants the summarizer
/// prompt contract promises downstream consumers.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidSummary {
    #[error("executive summary is shorter than 10 characters")]
    ExecutiveTooShort,
    #[error("technical summary is shorter than 50 characters")]
    TechnicalTooShort,
}

/// The structured LLM output for one post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub post_id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub executive_summary: String,
    pub technical_summary: String,
    /// Ordered short takeaways.
    pub bullets: Vec<String>,
    /// Lowercased, deduplicated keywords in first-seen order.
    pub keywords: Vec<String>,
}

impl Summary {
    pub const MIN_EXECUTIVE_CHARS: usize = 10;
    pub const MIN_TECHNICAL_CHARS: usize = 50;

    /// Builds a summary, normalizing keywords (lowercase, deduplicated,
    /// first-seen order preserved) and enforcing the minimum lengths of the
    /// two prose fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        post_id: String,
        title: String,
        url: String,
        source: String,
        published_at: Option<DateTime<Utc>>,
        executive_summary: String,
        technical_summary: String,
        bullets: Vec<String>,
        keywords: Vec<String>,
    ) -> Result<Self, InvalidSummary> {
        if executive_summary.chars().count() < Self::MIN_EXECUTIVE_CHARS {
            return Err(InvalidSummary::ExecutiveTooShort);
        }
        if technical_summary.chars().count() < Self::MIN_TECHNICAL_CHARS {
            return Err(InvalidSummary::TechnicalTooShort);
        }

        let mut normalized = Vec::new();
        for keyword in keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }

        Ok(Self {
            post_id,
            title,
            url,
            source,
            published_at,
            executive_summary,
            technical_summary,
            bullets,
            keywords: normalized,
        })
    }

    /// Renders the deterministic text document written into the retrieval
    /// corpus for this summary.
    pub fn to_indexable_document(&self) -> String {
        let mut doc = String::new();
        let _ = writeln!(doc, "Title: {}", self.title);
        let _ = writeln!(doc, "URL: {}", self.url);
        doc.push('\n');
        let _ = writeln!(doc, "Executive summary:\n{}", self.executive_summary);
        doc.push('\n');
        let _ = writeln!(doc, "Technical summary:\n{}", self.technical_summary);
        if !self.bullets.is_empty() {
            doc.push('\n');
            doc.push_str("Key points:\n");
            for bullet in &self.bullets {
                let _ = writeln!(doc, "- {bullet}");
            }
        }
        if !self.keywords.is_empty() {
            doc.push('\n');
            let _ = writeln!(doc, "Keywords: {}", self.keywords.join(", "));
        }
        doc
    }

    /// Flattens the summary into the fixed-key metadata mapping stored next
    /// to the indexable document.
    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("post_id".to_string(), json!(self.post_id));
        metadata.insert("title".to_string(), json!(self.title));
        metadata.insert("url".to_string(), json!(self.url));
        metadata.insert(
            "published_at".to_string(),
            match &self.published_at {
                Some(ts) => json!(ts.to_rfc3339()),
                None => Value::Null,
            },
        );
        metadata.insert("keywords".to_string(), json!(self.keywords));
        metadata.insert("source".to_string(), json!(self.source));
        metadata
    }
}

/// A single retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDoc {
    pub post_id: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Relevance in `[0, 1]`; clamped on ingress, higher is better.
    pub score: f64,
    pub metadata: Map<String, Value>,
}

/// The per-run record of one ingestion pass, returned by the pipeline and
/// appended to the persistent history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionResult {
    pub discovered_count: usize,
    pub new_count: usize,
    pub summarized_count: usize,
    pub ingested_count: usize,
    /// Ids of the posts ingested this run, in feed order.
    pub new_post_ids: Vec<String>,
    pub ran_at: DateTime<Utc>,
}

impl IngestionResult {
    /// An empty run record stamped `now`.
    pub fn empty() -> Self {
        Self {
            discovered_count: 0,
            new_count: 0,
            summarized_count: 0,
            ingested_count: 0,
            new_post_ids: Vec::new(),
            ran_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with_keywords(keywords: Vec<&str>) -> Summary {
        Summary::new(
            "id".into(),
            "Title".into(),
            "https://example.org/a".into(),
            "blog".into(),
            None,
            "An executive summary.".into(),
            "A technical summary that is comfortably longer than fifty characters in total.".into(),
            vec!["point one".into()],
            keywords.into_iter().map(String::from).collect(),
        )
        .expect("summary fixture is valid")
    }

    #[test]
    fn post_id_is_deterministic_and_url_sensitive() {
        let a = post_id_for_url("https://example.org/a");
        let b = post_id_for_url("https://example.org/a");
        let c = post_id_for_url("https://example.org/b");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn keywords_are_lowercased_and_deduplicated_in_order() {
        let summary = summary_with_keywords(vec!["Rust", "GPU", "rust", "  CUDA  ", "gpu"]);
        assert_eq!(summary.keywords, vec!["rust", "gpu", "cuda"]);
    }

    #[test]
    fn short_prose_fields_are_rejected() {
        let result = Summary::new(
            "id".into(),
            "Title".into(),
            "https://example.org/a".into(),
            "blog".into(),
            None,
            "too short".into(),
            "long enough technical summary with more than fifty characters in it, honestly.".into(),
            vec![],
            vec![],
        );
        assert_eq!(result.unwrap_err(), InvalidSummary::ExecutiveTooShort);

        let result = Summary::new(
            "id".into(),
            "Title".into(),
            "https://example.org/a".into(),
            "blog".into(),
            None,
            "a fine executive summary".into(),
            "too short".into(),
            vec![],
            vec![],
        );
        assert_eq!(result.unwrap_err(), InvalidSummary::TechnicalTooShort);
    }

    #[test]
    fn metadata_carries_the_fixed_keys() {
        let summary = summary_with_keywords(vec!["rust"]);
        let metadata = summary.to_metadata();
        for key in ["post_id", "title", "url", "published_at", "keywords", "source"] {
            assert!(metadata.contains_key(key), "missing key {key}");
        }
        assert_eq!(metadata["published_at"], Value::Null);
        assert_eq!(metadata["source"], json!("blog"));
    }

    #[test]
    fn indexable_document_is_deterministic() {
        let summary = summary_with_keywords(vec!["rust", "gpu"]);
        let first = summary.to_indexable_document();
        let second = summary.to_indexable_document();
        assert_eq!(first, second);
        assert!(first.contains("Title: Title"));
        assert!(first.contains("URL: https://example.org/a"));
        assert!(first.contains("- point one"));
        assert!(first.contains("Keywords: rust, gpu"));
    }

    #[test]
    fn scores_clamp_into_unit_interval() {
        assert_eq!(clamp_score(0.5), 0.5);
        assert_eq!(clamp_score(-0.1), 0.0);
        assert_eq!(clamp_score(7.3), 1.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }
}
