//! Feed processing: new-entry selection and the delivery loop.
//!
//! One [`FeedProcessor`] owns handles to every collaborator. A pass fetches
//! each feed, filters it by keyword, picks the entries not yet delivered,
//! and posts them oldest first through the shared rate limiter.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::content::ContentFetcher;
use crate::delivery::DeliveryPort;
use crate::feed::{filter_by_keywords, Entry, FeedDescriptor, FeedSource};
use crate::note::{Note, Visibility};
use crate::rate_limit::TokenBucket;
use crate::store::DedupStore;
use crate::summarize::{NoopSummarizer, Summarizer};
use crate::{RelayError, Result};

/// Default time budget for producing one summary.
pub const DEFAULT_SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Entry bodies shorter than this are replaced by fetched page text.
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 200;

/// Counters for one feed in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    /// Entries returned by the feed source.
    pub fetched: usize,
    /// Entries left after keyword filtering.
    pub matched: usize,
    /// Entries chosen for delivery.
    pub selected: usize,
    /// Entries posted successfully.
    pub delivered: usize,
    /// Entries whose post failed.
    pub failed: usize,
}

/// Orchestrates fetching, selection and delivery for a set of feeds.
pub struct FeedProcessor {
    source: Arc<dyn FeedSource>,
    delivery: Arc<dyn DeliveryPort>,
    store: Arc<dyn DedupStore>,
    limiter: Arc<TokenBucket>,
    summarizer: Arc<dyn Summarizer>,
    content: Option<Arc<dyn ContentFetcher>>,
    visibility: Visibility,
    first_run_latest_only: bool,
    summarize_timeout: Duration,
    min_content_length: usize,
}

impl FeedProcessor {
    /// Create a processor with summaries disabled and the latest-only
    /// first-run policy on.
    pub fn new(
        source: Arc<dyn FeedSource>,
        delivery: Arc<dyn DeliveryPort>,
        store: Arc<dyn DedupStore>,
        limiter: Arc<TokenBucket>,
    ) -> Self {
        Self {
            source,
            delivery,
            store,
            limiter,
            summarizer: Arc::new(NoopSummarizer),
            content: None,
            visibility: Visibility::default(),
            first_run_latest_only: true,
            summarize_timeout: DEFAULT_SUMMARIZE_TIMEOUT,
            min_content_length: DEFAULT_MIN_CONTENT_LENGTH,
        }
    }

    /// Set the summarizer.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Set the page fetcher used when entry bodies are too short.
    pub fn with_content_fetcher(mut self, content: Arc<dyn ContentFetcher>) -> Self {
        self.content = Some(content);
        self
    }

    /// Set the visibility of posted notes.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the first-run policy.
    ///
    /// Ignored when the store is volatile: the policy stays on.
    pub fn with_first_run_latest_only(mut self, enabled: bool) -> Self {
        if !enabled && !self.store.is_durable() {
            warn!("first_run_latest_only=false requires a persistent cache; keeping it enabled");
        }
        self.first_run_latest_only = enabled;
        self
    }

    /// Set the time budget for one summary, page fetch included.
    pub fn with_summarize_timeout(mut self, timeout: Duration) -> Self {
        self.summarize_timeout = timeout;
        self
    }

    /// Set the body length below which page text is fetched.
    pub fn with_min_content_length(mut self, length: usize) -> Self {
        self.min_content_length = length;
        self
    }

    /// Effective first-run policy.
    pub fn latest_only_on_first_run(&self) -> bool {
        self.first_run_latest_only || !self.store.is_durable()
    }

    /// Run one pass over `feeds`, in order.
    ///
    /// A failing feed is logged and skipped. Cancellation stops the pass.
    /// Returns the number of notes delivered.
    pub async fn process_all(&self, cancel: &CancellationToken, feeds: &[FeedDescriptor]) -> usize {
        let mut delivered = 0;

        for feed in feeds {
            if cancel.is_cancelled() {
                info!("Pass cancelled before {}", feed.url);
                break;
            }

            match self.process_feed(cancel, feed).await {
                Ok(report) => delivered += report.delivered,
                Err(e) if e.is_cancelled() => {
                    info!("Pass cancelled while processing {}", feed.url);
                    break;
                }
                Err(e) => error!("Error processing feed {}: {}", feed.url, e),
            }
        }

        delivered
    }

    /// Process a single feed: fetch, filter, select and deliver.
    pub async fn process_feed(
        &self,
        cancel: &CancellationToken,
        feed: &FeedDescriptor,
    ) -> Result<FeedReport> {
        let mut report = FeedReport::default();

        let entries = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            result = self.source.fetch(&feed.url) => result?,
        };
        report.fetched = entries.len();

        let entries = filter_by_keywords(entries, &feed.keywords);
        report.matched = entries.len();
        if entries.is_empty() {
            debug!("No matching entries in {}", feed.url);
            return Ok(report);
        }

        let watermark = self.store.watermark(&feed.url).await?;
        let selected = self.select_new_entries(entries, watermark).await?;
        report.selected = selected.len();
        if selected.is_empty() {
            debug!("No new entries in {}", feed.url);
            return Ok(report);
        }

        let mut newest: Option<DateTime<Utc>> = None;
        let mut outcome = Ok(());
        for entry in &selected {
            match self.deliver_entry(cancel, &feed.url, entry).await {
                Ok(true) => {
                    report.delivered += 1;
                    newest = newest.max(Some(entry.published));
                }
                Ok(false) => report.failed += 1,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        if let Some(newest) = newest {
            if watermark.map_or(true, |current| newest > current) {
                self.store.set_watermark(&feed.url, newest).await?;
            }
        }
        outcome?;

        info!(
            "Processed {}: {} new, {} delivered, {} failed",
            feed.url, report.selected, report.delivered, report.failed
        );
        Ok(report)
    }

    /// Pick the entries to deliver, oldest first.
    ///
    /// On a first run with the latest-only policy, only the most recent entry
    /// is picked (the earliest in input order on a tie) and the rest are left
    /// unmarked. The pick is posted even if its id was delivered elsewhere.
    /// Otherwise entries already delivered, or not newer than the watermark,
    /// are dropped.
    async fn select_new_entries(
        &self,
        entries: Vec<Entry>,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<Vec<Entry>> {
        let candidates = match watermark {
            None if self.latest_only_on_first_run() => {
                let latest = entries.into_iter().reduce(|latest, entry| {
                    if entry.published > latest.published {
                        entry
                    } else {
                        latest
                    }
                });
                return Ok(latest.into_iter().collect());
            }
            None => entries,
            Some(watermark) => entries
                .into_iter()
                .filter(|entry| entry.is_newer_than(watermark))
                .collect(),
        };

        let mut selected = Vec::with_capacity(candidates.len());
        for entry in candidates {
            if self.store.is_delivered(&entry.id).await? {
                debug!("Skipping already delivered entry {}", entry.id);
                continue;
            }
            selected.push(entry);
        }

        selected.sort_by_key(|entry| entry.published);
        Ok(selected)
    }

    /// Summarize, rate-limit and post one entry.
    ///
    /// Returns `Ok(false)` when the post failed; the entry stays unmarked and
    /// is retried on the next pass. Only cancellation is an error.
    async fn deliver_entry(
        &self,
        cancel: &CancellationToken,
        feed_url: &str,
        entry: &Entry,
    ) -> Result<bool> {
        let summary = self.summarize_entry(cancel, entry).await;
        let note = Note::from_entry(entry, summary.as_deref(), self.visibility);

        self.limiter.wait(cancel).await?;

        let posted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            result = self.delivery.post(&note) => result,
        };
        if let Err(e) = posted {
            warn!(
                "Failed to post entry {} ({}) from {}: {}",
                entry.id, entry.title, feed_url, e
            );
            return Ok(false);
        }

        info!("Posted: {} ({})", entry.title, feed_url);

        if let Err(e) = self.store.mark_delivered(&entry.id).await {
            error!(
                "Failed to mark entry {} ({}) as delivered: {}",
                entry.id, entry.title, e
            );
        }
        Ok(true)
    }

    /// Produce a summary for an entry, or `None` on any failure.
    async fn summarize_entry(&self, cancel: &CancellationToken, entry: &Entry) -> Option<String> {
        if !self.summarizer.is_enabled() {
            return None;
        }

        let work = async {
            let article = self.article_text(entry).await;
            if article.trim().is_empty() {
                return Err(RelayError::Summarize("no article text".to_string()));
            }
            self.summarizer.summarize(&article, &entry.title).await
        };

        let timed = async {
            tokio::time::timeout(self.summarize_timeout, work)
                .await
                .map_err(|_| {
                    RelayError::Timeout(format!("summary after {:?}", self.summarize_timeout))
                })?
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = timed => result,
        };

        match result {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Failed to summarize {} ({}): {}", entry.id, entry.title, e);
                None
            }
        }
    }

    /// Entry body, or fetched page text when the body is too short.
    async fn article_text(&self, entry: &Entry) -> String {
        let Some(content) = &self.content else {
            return entry.description.clone();
        };
        if entry.description.chars().count() >= self.min_content_length || entry.link.is_empty() {
            return entry.description.clone();
        }

        match content.fetch_text(&entry.link).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to fetch content for {} ({}): {}", entry.id, entry.link, e);
                entry.description.clone()
            }
        }
    }
}
