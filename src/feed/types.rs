//! Feed entry types.

use chrono::{DateTime, Utc};

use crate::config::FeedConfig;

/// Maximum length for an entry description, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 10000;

/// Maximum feed size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// A single feed entry.
///
/// Entries are immutable once fetched. `id` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Stable identifier (feed id, or the link when the feed has none).
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Link to the article.
    pub link: String,
    /// Plain-text description / body.
    pub description: String,
    /// Publish timestamp.
    pub published: DateTime<Utc>,
}

impl Entry {
    /// Create a new entry.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            description: String::new(),
            published,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check if this entry was published strictly after `t`.
    pub fn is_newer_than(&self, t: DateTime<Utc>) -> bool {
        self.published > t
    }
}

/// A watched feed: its address plus an optional keyword set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    /// Feed address; keys the watermark.
    pub url: String,
    /// Keywords; empty accepts every entry.
    pub keywords: Vec<String>,
}

impl FeedDescriptor {
    /// Create a descriptor without keywords.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            keywords: Vec::new(),
        }
    }

    /// Set the keyword list.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&FeedConfig> for FeedDescriptor {
    fn from(config: &FeedConfig) -> Self {
        Self {
            url: config.url.clone(),
            keywords: config.keywords.clone(),
        }
    }
}
