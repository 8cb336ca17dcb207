//! SQLite-backed dedup store.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::schema::MIGRATIONS;
use super::DedupStore;
use crate::Result;

/// Durable store backed by a single-connection SQLite pool.
///
/// The pool holds exactly one connection: this process is the only writer.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the cache database at `path` and apply migrations.
    ///
    /// Fails if the location cannot be created or opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening cache database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        Self::connect(options).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory cache database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Apply pending migrations.
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version = self.schema_version().await?;
        if current_version as usize >= MIGRATIONS.len() {
            debug!("Cache schema is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating cache schema from version {} to {}",
            current_version,
            MIGRATIONS.len()
        );

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            let mut tx = self.pool.begin().await?;

            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(version)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            debug!("Cache migration v{} applied", version);
        }

        Ok(())
    }

    /// Delete delivered ids recorded more than `age` ago.
    ///
    /// Watermarks are left untouched. Returns the number of deleted ids.
    pub async fn cleanup_older_than(&self, age: Duration) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - age.as_secs() as i64;
        let result = sqlx::query("DELETE FROM delivered_entries WHERE delivered_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Close the pool, flushing pending writes.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DedupStore for SqliteStore {
    async fn watermark(&self, feed_url: &str) -> Result<Option<DateTime<Utc>>> {
        let published: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT published_at FROM watermarks WHERE feed_url = $1")
                .bind(feed_url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(published)
    }

    async fn set_watermark(&self, feed_url: &str, published: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watermarks (feed_url, published_at) VALUES ($1, $2)
            ON CONFLICT(feed_url) DO UPDATE
                SET published_at = excluded.published_at, updated_at = datetime('now')
            "#,
        )
        .bind(feed_url)
        .bind(published)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_delivered(&self, entry_id: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM delivered_entries WHERE entry_id = $1")
                .bind(entry_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn mark_delivered(&self, entry_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO delivered_entries (entry_id, delivered_at) VALUES ($1, $2)
             ON CONFLICT(entry_id) DO NOTHING",
        )
        .bind(entry_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn insert_delivered_at(store: &SqliteStore, entry_id: &str, at: i64) {
        sqlx::query("INSERT INTO delivered_entries (entry_id, delivered_at) VALUES ($1, $2)")
            .bind(entry_id)
            .bind(at)
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_in_memory_applies_migrations() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), MIGRATIONS.len() as i64);
        assert!(store.is_durable());
    }

    #[tokio::test]
    async fn test_watermark_keeps_subsecond_precision() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let t = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        store.set_watermark("https://example.tld/rss", t).await.unwrap();
        assert_eq!(
            store.watermark("https://example.tld/rss").await.unwrap(),
            Some(t)
        );
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.set_watermark("feed", t).await.unwrap();
            store.mark_delivered("guid-1").await.unwrap();
            store.close().await;
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.watermark("feed").await.unwrap(), Some(t));
        assert!(store.is_delivered("guid-1").await.unwrap());
        assert!(!store.is_delivered("guid-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("cache.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store.close().await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_open_unusable_location_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot be a parent directory
        let path = file.path().join("cache.db");

        assert!(SqliteStore::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_old_ids() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let now = Utc::now().timestamp();
        let watermark = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        store.set_watermark("feed", watermark).await.unwrap();
        insert_delivered_at(&store, "old-1", now - 10 * 86400).await;
        insert_delivered_at(&store, "old-2", now - 8 * 86400).await;
        store.mark_delivered("fresh").await.unwrap();

        let deleted = store
            .cleanup_older_than(Duration::from_secs(7 * 86400))
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert!(!store.is_delivered("old-1").await.unwrap());
        assert!(!store.is_delivered("old-2").await.unwrap());
        assert!(store.is_delivered("fresh").await.unwrap());
        assert_eq!(store.watermark("feed").await.unwrap(), Some(watermark));
    }

    #[tokio::test]
    async fn test_cleanup_with_nothing_old() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.mark_delivered("fresh").await.unwrap();

        let deleted = store
            .cleanup_older_than(Duration::from_secs(86400))
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }
}
