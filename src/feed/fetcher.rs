//! Feed fetching over HTTP.
//!
//! Downloads RSS/Atom documents with resource limits and parses them into
//! [`Entry`] values with feed-rs.

use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use scraper::Html;
use tracing::debug;

use super::types::{Entry, MAX_DESCRIPTION_LENGTH, MAX_FEED_SIZE};
use crate::{RelayError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout in seconds.
const READ_TIMEOUT_SECS: u64 = 20;

/// Total timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User agent string for feed fetching.
const USER_AGENT: &str = "feedrelay/0.1 (RSS to Misskey)";

/// Source of feed entries.
///
/// Implementations only return entries that carry a publish timestamp.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the entries currently published at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<Entry>>;
}

/// Feed source backed by reqwest and feed-rs.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    /// Create a new source with default limits.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Feed(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<Entry>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::Feed(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Feed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(RelayError::Feed(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, MAX_FEED_SIZE
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Feed(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(RelayError::Feed(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_FEED_SIZE
            )));
        }

        parse_entries(&bytes)
    }
}

/// Parse feed bytes into timestamped entries, in document order.
///
/// Entries without a publish or update date are dropped. An entry without
/// an id falls back to its first link; entries with neither are dropped.
pub fn parse_entries(bytes: &[u8]) -> Result<Vec<Entry>> {
    let feed =
        parser::parse(bytes).map_err(|e| RelayError::Feed(format!("failed to parse feed: {}", e)))?;

    let mut entries = Vec::with_capacity(feed.entries.len());
    for item in feed.entries {
        let Some(published) = item.published.or(item.updated) else {
            debug!("Skipping entry without timestamp: {}", item.id);
            continue;
        };

        let link = item
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();
        let id = if item.id.trim().is_empty() {
            link.clone()
        } else {
            item.id
        };
        if id.is_empty() {
            debug!("Skipping entry without id or link");
            continue;
        }

        let title = item.title.map(|t| t.content).unwrap_or_default();
        let description = item
            .summary
            .map(|t| t.content)
            .or(item.content.and_then(|c| c.body))
            .map(|d| truncate(&html_to_text(&d), MAX_DESCRIPTION_LENGTH))
            .unwrap_or_default();

        entries.push(Entry {
            id,
            title,
            link,
            description,
            published,
        });
    }

    Ok(entries)
}

/// Convert an HTML fragment to whitespace-collapsed text.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
