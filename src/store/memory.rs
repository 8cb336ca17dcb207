//! In-process dedup store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::DedupStore;
use crate::Result;

#[derive(Debug, Default)]
struct State {
    watermarks: HashMap<String, DateTime<Utc>>,
    delivered: HashSet<String>,
}

/// Volatile store; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn watermark(&self, feed_url: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.read().await.watermarks.get(feed_url).copied())
    }

    async fn set_watermark(&self, feed_url: &str, published: DateTime<Utc>) -> Result<()> {
        self.state
            .write()
            .await
            .watermarks
            .insert(feed_url.to_string(), published);
        Ok(())
    }

    async fn is_delivered(&self, entry_id: &str) -> Result<bool> {
        Ok(self.state.read().await.delivered.contains(entry_id))
    }

    async fn mark_delivered(&self, entry_id: &str) -> Result<()> {
        self.state
            .write()
            .await
            .delivered
            .insert(entry_id.to_string());
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
