//! Watermark and delivered-set storage.
//!
//! Two backends implement [`DedupStore`]: [`MemoryStore`] (lost on restart)
//! and [`SqliteStore`] (durable, with a retention sweep).

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use schema::MIGRATIONS;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

/// Per-feed watermark and delivered-id storage.
///
/// Implementations are internally synchronized.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Latest delivered publish time for a feed, `None` if never set.
    async fn watermark(&self, feed_url: &str) -> Result<Option<DateTime<Utc>>>;

    /// Overwrite the watermark for a feed.
    async fn set_watermark(&self, feed_url: &str, published: DateTime<Utc>) -> Result<()>;

    /// Whether an entry id was already delivered.
    async fn is_delivered(&self, entry_id: &str) -> Result<bool>;

    /// Record an entry id as delivered. Marking twice is a no-op.
    async fn mark_delivered(&self, entry_id: &str) -> Result<()>;

    /// Whether the store survives a process restart.
    fn is_durable(&self) -> bool;
}
