//! # Article Extraction Glue
//!
//! Binds the pure HTML extraction of `blogwatch-html` to the data model:
//! given a post and its page markup, produce the immutable [`RawContent`]
//! record the summarizer consumes.

use crate::types::{Post, RawContent};
use blogwatch_html::extract_article;

/// Extracts cleaned text and sections from an article page.
///
/// The `html` field of the result is the input unchanged. When the page
/// yields no visible text at all, the post title is substituted so that
/// downstream stages never see an empty body.
pub fn extract(post: &Post, html: &str) -> RawContent {
    let extraction = extract_article(html);

    let text = if extraction.text.is_empty() {
        post.title.clone()
    } else {
        extraction.text
    };

    RawContent {
        post_id: post.id.clone(),
        url: post.url.clone(),
        title: post.title.clone(),
        source: post.source.clone(),
        published_at: post.published_at,
        html: html.to_string(),
        text,
        sections: extraction.sections,
    }
}
