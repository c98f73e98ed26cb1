//! # Feed Parsing
//!
//! Turns a feed document into an ordered sequence of [`Post`]s. Atom and
//! RSS 2.0 are handled by `feed-rs`; anything that does not look like XML is
//! treated as an HTML index page and scraped for plausible article links.
//!
//! The parser is deliberately tolerant: broken documents yield an empty
//! sequence, entries missing a URL or title are dropped silently, and
//! unparseable timestamps degrade to `None`. Input order is preserved.

use crate::types::{post_id_for_url, Post};
use feed_rs::model::{Entry, Feed, FeedType};
use feed_rs::parser;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// The wire format a feed document was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Atom,
    Rss,
    HtmlIndex,
}

/// Cheap prefix/shape inspection of a feed document.
///
/// A root of `rss` means RSS 2.0; an XML prolog or a root of `feed` means
/// Atom; anything else is treated as an HTML index page.
pub fn detect_format(content: &str) -> FeedFormat {
    let head: String = content.chars().take(512).collect::<String>().to_ascii_lowercase();
    if head.contains("<rss") {
        FeedFormat::Rss
    } else if head.contains("<feed") || head.trim_start().starts_with("<?xml") {
        FeedFormat::Atom
    } else {
        FeedFormat::HtmlIndex
    }
}

/// Parses a feed document into posts, labelling each with `source`.
pub fn parse_feed(content: &str, source: &str) -> Vec<Post> {
    match detect_format(content) {
        FeedFormat::HtmlIndex => parse_html_index(content, source),
        _ => parse_xml_feed(content, source),
    }
}

fn parse_xml_feed(content: &str, source: &str) -> Vec<Post> {
    let feed = match parser::parse(content.as_bytes()) {
        Ok(feed) => feed,
        Err(err) => {
            warn!("failed to parse feed document: {err}");
            return Vec::new();
        }
    };

    // The sniff only routed us away from the HTML path; the parsed document
    // is authoritative about which XML dialect this actually is.
    let format = match feed.feed_type {
        FeedType::Atom => FeedFormat::Atom,
        FeedType::RSS0 | FeedType::RSS1 | FeedType::RSS2 | FeedType::JSON => FeedFormat::Rss,
    };
    debug!(entries = feed.entries.len(), ?format, "parsed feed document");

    feed_to_posts(feed, source, format)
}

fn feed_to_posts(feed: Feed, source: &str, format: FeedFormat) -> Vec<Post> {
    feed.entries
        .into_iter()
        .filter_map(|entry| entry_to_post(entry, source, format))
        .collect()
}

/// Maps one feed entry to a post, or `None` when the entry lacks a usable
/// absolute URL or a non-empty title.
fn entry_to_post(entry: Entry, source: &str, format: FeedFormat) -> Option<Post> {
    let link = match format {
        FeedFormat::Atom => entry
            .links
            .iter()
            .find(|link| link.rel.as_deref() == Some("alternate"))
            .or_else(|| entry.links.first()),
        _ => entry.links.first(),
    }?;
    let url = Url::parse(link.href.trim()).ok()?;

    let title = entry
        .title
        .as_ref()
        .map(|title| title.content.trim().to_string())
        .filter(|title| !title.is_empty())?;

    let published_at = match format {
        FeedFormat::Atom => entry.updated.or(entry.published),
        _ => entry.published.or(entry.updated),
    };

    let tags: Vec<String> = entry
        .categories
        .iter()
        .map(|category| category.term.trim().to_string())
        .filter(|term| !term.is_empty())
        .collect();

    let inline_content = inline_content_for(&entry, format);

    Some(Post {
        id: post_id_for_url(url.as_str()),
        url: url.to_string(),
        title,
        published_at,
        tags,
        source: source.to_string(),
        inline_content,
    })
}

/// Harvests inline article HTML from an entry when the feed carried it.
///
/// Atom entries contribute their `content` only when it is HTML or XHTML;
/// RSS items prefer `content:encoded` and fall back to `description`.
fn inline_content_for(entry: &Entry, format: FeedFormat) -> Option<String> {
    let body = match format {
        FeedFormat::Atom => entry
            .content
            .as_ref()
            .filter(|content| content.content_type.essence().to_string().contains("html"))
            .and_then(|content| content.body.clone()),
        FeedFormat::Rss => entry
            .content
            .as_ref()
            .and_then(|content| content.body.clone())
            .or_else(|| entry.summary.as_ref().map(|summary| summary.content.clone())),
        FeedFormat::HtmlIndex => None,
    };
    body.filter(|body| !body.trim().is_empty())
}

/// Scrapes an HTML index page for article links: walks candidate containers
/// in priority order and takes, per container, the first anchor carrying an
/// absolute URL and non-empty text. Duplicate targets (nested containers)
/// collapse to the first sighting.
fn parse_html_index(content: &str, source: &str) -> Vec<Post> {
    let document = Html::parse_document(content);
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut posts = Vec::new();
    let mut seen_ids = HashSet::new();

    for container in ["article", "div.post", "div"] {
        let Ok(container_selector) = Selector::parse(container) else {
            continue;
        };
        for element in document.select(&container_selector) {
            for anchor in element.select(&anchor_selector) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                let Ok(url) = Url::parse(href.trim()) else {
                    continue;
                };
                let title = blogwatch_html::collapse_whitespace(&anchor.text().collect::<String>());
                if title.is_empty() {
                    continue;
                }

                let id = post_id_for_url(url.as_str());
                if seen_ids.insert(id.clone()) {
                    posts.push(Post {
                        id,
                        url: url.to_string(),
                        title,
                        published_at: None,
                        tags: Vec::new(),
                        source: source.to_string(),
                        inline_content: None,
                    });
                }
                // One link per container; nested containers are revisited by
                // the broader selectors.
                break;
            }
        }
    }

    posts
}
