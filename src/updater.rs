//! Background loops: the periodic feed pass and the cache retention sweep.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::feed::FeedDescriptor;
use crate::processor::FeedProcessor;
use crate::store::SqliteStore;
use crate::Result;

/// Default fetch interval in seconds (30 minutes).
pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 1800;

/// Periodic feed updater.
///
/// Runs one pass over every feed immediately, then once per interval,
/// until cancelled.
pub struct FeedUpdater {
    processor: Arc<FeedProcessor>,
    feeds: Vec<FeedDescriptor>,
    fetch_interval: Duration,
}

impl FeedUpdater {
    /// Create an updater with the default fetch interval.
    pub fn new(processor: Arc<FeedProcessor>, feeds: Vec<FeedDescriptor>) -> Self {
        Self {
            processor,
            feeds,
            fetch_interval: Duration::from_secs(DEFAULT_FETCH_INTERVAL_SECS),
        }
    }

    /// Set the fetch interval.
    pub fn with_interval(mut self, fetch_interval: Duration) -> Self {
        self.fetch_interval = fetch_interval;
        self
    }

    /// Run the pass loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Feed updater started ({} feed(s), interval: {} seconds)",
            self.feeds.len(),
            self.fetch_interval.as_secs()
        );

        let mut timer = interval(self.fetch_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            debug!("Starting feed pass");
            let delivered = self.processor.process_all(&cancel, &self.feeds).await;
            if delivered > 0 {
                info!("Feed pass complete: {} note(s) delivered", delivered);
            } else {
                debug!("Feed pass complete: nothing new");
            }
        }

        info!("Feed updater stopped");
    }
}

/// Periodic deletion of old delivered ids from the durable store.
pub struct RetentionSweeper {
    store: Arc<SqliteStore>,
    retention: Duration,
    sweep_interval: Duration,
}

impl RetentionSweeper {
    /// Create a sweeper deleting ids older than `retention` every `sweep_interval`.
    pub fn new(store: Arc<SqliteStore>, retention: Duration, sweep_interval: Duration) -> Self {
        Self {
            store,
            retention,
            sweep_interval,
        }
    }

    /// Run one sweep. Returns the number of deleted ids.
    pub async fn sweep_once(&self) -> Result<u64> {
        let deleted = self.store.cleanup_older_than(self.retention).await?;
        if deleted > 0 {
            info!("Cache cleanup: removed {} delivered id(s)", deleted);
        } else {
            debug!("Cache cleanup: nothing to remove");
        }
        Ok(deleted)
    }

    /// Run the sweep loop until `cancel` fires.
    ///
    /// The first sweep happens one interval after start.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Cache cleanup started (retention: {} days, interval: {} hours)",
            self.retention.as_secs() / 86_400,
            self.sweep_interval.as_secs() / 3600
        );

        let mut timer = interval(self.sweep_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            if let Err(e) = self.sweep_once().await {
                error!("Cache cleanup failed: {}", e);
            }
        }

        debug!("Cache cleanup stopped");
    }
}

/// Spawn the retention sweeper as a background task.
pub fn start_retention_sweeper(
    sweeper: RetentionSweeper,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sweeper.run(cancel).await;
    })
}
