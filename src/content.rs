//! Article text extraction from web pages.
//!
//! Used when a feed entry's own description is too short to summarize.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::{RelayError, Result};

/// Maximum HTML bytes read from a page (2MB).
const MAX_HTML_BYTES: usize = 2 * 1024 * 1024;

/// Maximum extracted text length, in characters.
const MAX_TEXT_CHARS: usize = 8000;

/// Minimum length for a content container to count as the article.
const MIN_CONTAINER_CHARS: usize = 100;

/// Candidate article containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".article-content",
    "#content",
    ".content",
];

/// Elements whose text is never part of the article.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form",
];

const SKIPPED_CLASSES: &[&str] = &["ad", "advertisement"];

const USER_AGENT: &str = "feedrelay/0.1 (article fetcher)";

/// Fetches readable article text for a URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Content fetcher using reqwest and scraper.
pub struct HtmlContentFetcher {
    client: Client,
}

impl HtmlContentFetcher {
    /// Create a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Content(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HtmlContentFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::Content(format!("failed to fetch page: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Content(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RelayError::Content(format!("failed to read page: {}", e)))?
        {
            let room = MAX_HTML_BYTES - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!("Page {} truncated at {} bytes", url, MAX_HTML_BYTES);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&body);
        let text = extract_article_text(&html);
        if text.is_empty() {
            return Err(RelayError::Content("no article content found".to_string()));
        }
        Ok(text)
    }
}

/// Extract the main article text from an HTML document.
///
/// Tries the known content containers in order, falling back to `<body>`.
/// Whitespace is collapsed and the result capped in length.
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element_text(element);
            if text.chars().count() >= MIN_CONTAINER_CHARS {
                return cap_chars(text, MAX_TEXT_CHARS);
            }
        }
    }

    let fallback = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .map(element_text)
        .unwrap_or_default();
    cap_chars(fallback, MAX_TEXT_CHARS)
}

/// Visible text of an element with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_visible_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let value = child_element.value();
            let skipped = SKIPPED_TAGS.contains(&value.name())
                || value.classes().any(|c| SKIPPED_CLASSES.contains(&c));
            if !skipped {
                collect_visible_text(child_element, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

fn cap_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_paragraph(word: &str) -> String {
        std::iter::repeat(word).take(40).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_extract_prefers_article() {
        let html = format!(
            "<html><body><nav>Menu Home About</nav>\
             <article><h1>Title</h1><p>{}</p><script>var x = 1;</script></article>\
             <footer>Copyright</footer></body></html>",
            long_paragraph("article")
        );

        let text = extract_article_text(&html);
        assert!(text.starts_with("Title article article"));
        assert!(!text.contains("Menu"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_extract_uses_content_class() {
        let html = format!(
            "<html><body><div class=\"entry-content\"><p>{}</p>\
             <div class=\"ad\">Buy now</div></div></body></html>",
            long_paragraph("entry")
        );

        let text = extract_article_text(&html);
        assert!(text.starts_with("entry entry"));
        assert!(!text.contains("Buy now"));
    }

    #[test]
    fn test_short_container_falls_through_to_body() {
        let html = "<html><body><article>tiny</article><p>Body paragraph</p></body></html>";
        let text = extract_article_text(html);
        assert_eq!(text, "tiny Body paragraph");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(extract_article_text("<html><body></body></html>"), "");
    }

    #[test]
    fn test_text_is_capped() {
        let html = format!(
            "<html><body><article>{}</article></body></html>",
            "x".repeat(MAX_TEXT_CHARS + 500)
        );
        assert_eq!(extract_article_text(&html).chars().count(), MAX_TEXT_CHARS);
    }
}
