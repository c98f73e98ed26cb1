//! # Article Extraction
//!
//! This crate turns a raw HTML article page into cleaned plain text plus
//! heading-segmented sections. It knows nothing about feeds or posts; it is
//! a pure HTML-to-text layer shared by the ingestion pipeline.

use scraper::{ElementRef, Html, Selector};

/// Class fragments that mark a `<div>` as a plausible article container.
const ARTICLE_CLASS_HINTS: &[&str] = &[
    "post",
    "article",
    "blog-article",
    "blog-post",
    "content",
    "main-content",
];

/// Elements whose subtrees never contribute visible article text.
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// The result of extracting an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Cleaned plain text with all whitespace runs collapsed to single spaces.
    pub text: String,
    /// Ordered `"{heading}\n\n{paragraphs}"` blocks; empty when the page has
    /// no headings with content under them.
    pub sections: Vec<String>,
}

/// Extracts cleaned text and heading-segmented sections from an HTML page.
///
/// The article root is located by a fallback cascade: `<article>`, then a
/// `<div>` whose class contains a known article hint, then `<main>`, then
/// `<body>`. Script, style, and noscript subtrees are stripped. The returned
/// text may be empty when the page has no visible text at all; callers are
/// responsible for substituting a fallback.
pub fn extract_article(html: &str) -> Extraction {
    let document = Html::parse_document(html);

    let root = match find_article_root(&document) {
        Some(root) => root,
        None => return Extraction::default(),
    };

    let mut raw = String::new();
    collect_visible_text(root, &mut raw);
    let text = collapse_whitespace(&raw);

    let mut sections = extract_sections(root);
    if sections.is_empty() && !text.is_empty() {
        sections.push(text.clone());
    }

    Extraction { text, sections }
}

/// Collapses every run of whitespace, newlines included, to a single space
/// and trims the ends.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Locates the article root element by the fallback cascade.
fn find_article_root(document: &Html) -> Option<ElementRef<'_>> {
    if let Ok(selector) = Selector::parse("article") {
        if let Some(root) = document.select(&selector).next() {
            return Some(root);
        }
    }

    if let Ok(selector) = Selector::parse("div") {
        for div in document.select(&selector) {
            if let Some(class) = div.value().attr("class") {
                if ARTICLE_CLASS_HINTS.iter().any(|hint| class.contains(hint)) {
                    return Some(div);
                }
            }
        }
    }

    for fallback in ["main", "body"] {
        if let Ok(selector) = Selector::parse(fallback) {
            if let Some(root) = document.select(&selector).next() {
                return Some(root);
            }
        }
    }

    None
}

/// Appends the visible text under `element`, skipping invisible subtrees.
fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if INVISIBLE_ELEMENTS.contains(&child_element.value().name()) {
                continue;
            }
            collect_visible_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            // Element boundaries separate words even without whitespace text.
            out.push(' ');
        }
    }
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Walks the root in document order, starting a new section at each heading
/// and accumulating the paragraphs that follow it until the next heading.
fn extract_sections(root: ElementRef<'_>) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for node in root.descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();

        if is_heading(name) {
            flush_section(&mut sections, current.take());
            let heading = collapse_whitespace(&element.text().collect::<String>());
            if !heading.is_empty() {
                current = Some((heading, Vec::new()));
            }
        } else if name == "p" {
            if let Some((_, paragraphs)) = current.as_mut() {
                let paragraph = collapse_whitespace(&element.text().collect::<String>());
                if !paragraph.is_empty() {
                    paragraphs.push(paragraph);
                }
            }
        }
    }

    flush_section(&mut sections, current.take());
    sections
}

fn flush_section(sections: &mut Vec<String>, section: Option<(String, Vec<String>)>) {
    if let Some((heading, paragraphs)) = section {
        if !paragraphs.is_empty() {
            sections.push(format!("{heading}\n\n{}", paragraphs.join("\n\n")));
        }
    }
}
