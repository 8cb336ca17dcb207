//! Feed sources and entry filtering.

pub mod fetcher;
pub mod filter;
pub mod types;

pub use fetcher::{parse_entries, FeedSource, HttpFeedSource};
pub use filter::filter_by_keywords;
pub use types::{Entry, FeedDescriptor, MAX_DESCRIPTION_LENGTH, MAX_FEED_SIZE};
