//! # Prompt Templates
//!
//! Default prompt templates for the two LLM tasks the engine performs:
//! structured summarization of one article, and grounded answering over
//! retrieved summaries. Placeholders in `{braces}` are substituted at call
//! time.

// --- Summarization ---

pub const SUMMARIZATION_SYSTEM_PROMPT: &str = r#"You are an expert technical editor summarizing engineering blog posts. Analyze the provided article and respond ONLY with a valid JSON object containing exactly these keys:
- "executive_summary": a 2-3 sentence plain-language summary for a technical leader.
- "technical_summary": a detailed paragraph covering the concrete techniques, systems, and results in the article.
- "bullet_points": an array of short strings, each one key takeaway.
- "keywords": an array of topical keywords.
Do not include any other text, commentary, or explanations."#;

pub const SUMMARIZATION_USER_PROMPT: &str = r#"# Article
Title: {title}
URL: {url}

# Article Text
{article_text}{sections}"#;

// --- Grounded answering ---

pub const ANSWER_SYSTEM_PROMPT: &str = "You are a strict, factual assistant for a technical blog. Answer the user's question based *only* on the provided #Blog Context. If the context does not contain the answer, say that the blog posts you have do not cover it.";

pub const ANSWER_USER_PROMPT: &str = r#"# User Question
{prompt}

# Blog Context
{context}

# Your Answer:"#;
