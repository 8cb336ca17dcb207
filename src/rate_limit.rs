//! Token-bucket rate limiting for outbound delivery.
//!
//! One [`TokenBucket`] guards every post to a sink. Up to `capacity` posts
//! may go out back to back; after that callers are admitted one per
//! refill interval.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{RelayError, Result};

/// Mutable bucket state, only touched under the lock.
#[derive(Debug)]
struct Bucket {
    /// Available permits, always within `0..=capacity`.
    permits: u32,
    /// Start of the current, partially elapsed refill interval.
    last_refill: Instant,
}

/// Token bucket shared by all delivery calls to one sink.
///
/// # Example
///
/// ```
/// use feedrelay::rate_limit::TokenBucket;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let bucket = TokenBucket::new(3, Duration::from_secs(10));
/// let cancel = CancellationToken::new();
///
/// bucket.wait(&cancel).await.unwrap();
/// assert_eq!(bucket.available(), 2);
/// # }
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_interval: Duration,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// A zero capacity is raised to one; a zero interval to one millisecond.
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_interval: refill_interval.max(Duration::from_millis(1)),
            bucket: Mutex::new(Bucket {
                permits: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Maximum number of stored permits.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Time between permit refills.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Permits available right now.
    pub fn available(&self) -> u32 {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.permits
    }

    /// Wait for a permit and consume it.
    ///
    /// Returns immediately when a permit is available. Otherwise sleeps until
    /// the next refill; if `cancel` fires first, returns
    /// [`RelayError::Cancelled`] without consuming anything.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let wait_for = match self.try_take() {
                Ok(()) => return Ok(()),
                Err(remaining) => remaining,
            };

            trace!("Rate limit reached, waiting {:?}", wait_for);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                _ = tokio::time::sleep(wait_for) => {}
            }
            // The interval has elapsed, so the next try_take refills one
            // permit unless a concurrent waiter already took it.
        }
    }

    /// Take a permit, or return the time until the next refill.
    fn try_take(&self) -> std::result::Result<(), Duration> {
        let mut bucket = self.lock();
        let now = Instant::now();
        self.refill(&mut bucket, now);

        if bucket.permits > 0 {
            bucket.permits -= 1;
            return Ok(());
        }

        let elapsed = now.duration_since(bucket.last_refill);
        Err(self.refill_interval.saturating_sub(elapsed))
    }

    /// Add one permit per whole interval elapsed, capped at capacity.
    ///
    /// `last_refill` advances by whole intervals only, so partial progress
    /// toward the next permit is kept.
    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill);
        let interval_nanos = self.refill_interval.as_nanos();
        let intervals = elapsed.as_nanos() / interval_nanos;
        if intervals == 0 {
            return;
        }

        let added = u32::try_from(intervals).unwrap_or(u32::MAX);
        bucket.permits = bucket.permits.saturating_add(added).min(self.capacity);

        let remainder = (elapsed.as_nanos() % interval_nanos) as u64;
        bucket.last_refill = now - Duration::from_nanos(remainder);
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
