//! # Summarization and Answer Synthesis
//!
//! The LLM-facing component of the engine. It owns prompt assembly (with a
//! character budget on embedded article text), the deliberately forgiving
//! extraction of the JSON object from whatever the model returns, and the
//! grounded-answer prompt over retrieved documents.

use crate::errors::ProviderError;
use crate::prompts::{
    ANSWER_SYSTEM_PROMPT, ANSWER_USER_PROMPT, SUMMARIZATION_SYSTEM_PROMPT,
    SUMMARIZATION_USER_PROMPT,
};
use crate::providers::ai::AiProvider;
use crate::types::{RawContent, RetrievedDoc, Summary};
use regex::Regex;
use serde::Deserialize;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

/// Errors from the summarization side of the port.
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("LLM request failed for post {post_id}: {source}")]
    Provider {
        post_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to parse summary for post {post_id}: {reason}")]
    ParseFailed { post_id: String, reason: String },
}

impl SummarizeError {
    /// Parse and schema failures are permanent; only the underlying provider
    /// error can make a summarization attempt retryable.
    pub fn is_transient(&self) -> bool {
        match self {
            SummarizeError::Provider { source, .. } => source.is_transient(),
            SummarizeError::ParseFailed { .. } => false,
        }
    }
}

/// The JSON shape the summarization prompt instructs the model to emit.
/// Array fields default to empty; the two prose fields are validated by the
/// caller because their absence is a hard parse failure.
#[derive(Deserialize, Debug)]
struct SummaryPayload {
    executive_summary: Option<String>,
    technical_summary: Option<String>,
    #[serde(default)]
    bullet_points: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Summarizes articles and synthesizes grounded answers through one
/// [`AiProvider`].
#[derive(Debug, Clone)]
pub struct Summarizer {
    provider: Box<dyn AiProvider>,
    budget_chars: usize,
}

impl Summarizer {
    pub fn new(provider: Box<dyn AiProvider>, budget_chars: usize) -> Self {
        Self {
            provider,
            budget_chars,
        }
    }

    /// Produces a structured [`Summary`] for one article.
    pub async fn summarize(&self, raw: &RawContent) -> Result<Summary, SummarizeError> {
        let user_prompt = self.build_summarize_prompt(raw);

        let response = self
            .provider
            .generate(SUMMARIZATION_SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|source| SummarizeError::Provider {
                post_id: raw.post_id.clone(),
                source,
            })?;
        debug!(post_id = %raw.post_id, "received summary response");

        let payload =
            parse_summary_payload(&response).map_err(|reason| SummarizeError::ParseFailed {
                post_id: raw.post_id.clone(),
                reason,
            })?;

        let executive_summary =
            payload
                .executive_summary
                .ok_or_else(|| SummarizeError::ParseFailed {
                    post_id: raw.post_id.clone(),
                    reason: "missing executive_summary".to_string(),
                })?;
        let technical_summary =
            payload
                .technical_summary
                .ok_or_else(|| SummarizeError::ParseFailed {
                    post_id: raw.post_id.clone(),
                    reason: "missing technical_summary".to_string(),
                })?;

        Summary::new(
            raw.post_id.clone(),
            raw.title.clone(),
            raw.url.clone(),
            raw.source.clone(),
            raw.published_at,
            executive_summary,
            technical_summary,
            payload.bullet_points,
            payload.keywords,
        )
        .map_err(|invalid| SummarizeError::ParseFailed {
            post_id: raw.post_id.clone(),
            reason: invalid.to_string(),
        })
    }

    /// Synthesizes an answer to `question` grounded in the retrieved docs.
    pub async fn answer(
        &self,
        question: &str,
        docs: &[RetrievedDoc],
    ) -> Result<String, ProviderError> {
        let mut context = String::new();
        for doc in docs {
            let _ = writeln!(context, "## {}", doc.title);
            let _ = writeln!(context, "{}", doc.url);
            let _ = writeln!(context, "{}\n", doc.snippet);
        }

        let user_prompt = ANSWER_USER_PROMPT
            .replace("{prompt}", question)
            .replace("{context}", context.trim_end());

        self.provider
            .generate(ANSWER_SYSTEM_PROMPT, &user_prompt)
            .await
    }

    /// Builds the summarization user prompt, truncating the article text to
    /// the configured budget and appending sections while budget remains.
    fn build_summarize_prompt(&self, raw: &RawContent) -> String {
        let article_text = truncate_chars(&raw.text, self.budget_chars);

        let remaining = self.budget_chars.saturating_sub(article_text.chars().count());
        let sections = if remaining > 0 && !raw.sections.is_empty() {
            let joined = truncate_chars(&raw.sections.join("\n\n"), remaining);
            format!("\n\n# Sections\n{joined}")
        } else {
            String::new()
        };

        SUMMARIZATION_USER_PROMPT
            .replace("{title}", &raw.title)
            .replace("{url}", &raw.url)
            .replace("{article_text}", &article_text)
            .replace("{sections}", &sections)
    }
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        text.to_string()
    } else {
        text.chars().take(budget).collect()
    }
}

/// Extracts and parses the first JSON object from an LLM response.
///
/// The model is told to emit bare JSON, but in practice responses arrive
/// wrapped in code fences or prose. The extraction strips any fenced block
/// first, then scans for the first balanced `{...}` substring.
fn parse_summary_payload(response: &str) -> Result<SummaryPayload, String> {
    let unfenced = strip_code_fences(response);
    let object = first_json_object(&unfenced)
        .ok_or_else(|| "response contains no JSON object".to_string())?;
    serde_json::from_str(object).map_err(|err| err.to_string())
}

/// Removes a ```lang ... ``` wrapper of any language tag, if present.
fn strip_code_fences(response: &str) -> String {
    if let Ok(re) = Regex::new(r"```[a-zA-Z]*\s*([\s\S]*?)```") {
        if let Some(captures) = re.captures(response) {
            if let Some(inner) = captures.get(1) {
                return inner.as_str().to_string();
            }
        }
    }
    response.to_string()
}

/// Finds the first balanced `{...}` substring, honoring JSON string escapes.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
