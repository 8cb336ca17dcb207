//! feedrelay - RSS/Atom to Misskey relay
//!
//! Periodically fetches feeds, selects entries not yet delivered, optionally
//! summarizes them, and posts them as notes under a shared rate limit.

pub mod config;
pub mod content;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod logging;
pub mod note;
pub mod processor;
pub mod rate_limit;
pub mod store;
pub mod summarize;
pub mod updater;

pub use config::Config;
pub use content::{extract_article_text, ContentFetcher, HtmlContentFetcher};
pub use delivery::{DeliveryPort, MisskeyClient};
pub use error::{RelayError, Result};
pub use feed::{filter_by_keywords, Entry, FeedDescriptor, FeedSource, HttpFeedSource};
pub use note::{Note, Visibility};
pub use processor::{FeedProcessor, FeedReport};
pub use rate_limit::TokenBucket;
pub use store::{DedupStore, MemoryStore, SqliteStore};
pub use summarize::{GeminiSummarizer, NoopSummarizer, Summarizer};
pub use updater::{start_retention_sweeper, FeedUpdater, RetentionSweeper};
