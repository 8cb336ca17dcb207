//! Durable store schema migrations.

/// Database migrations.
///
/// Each migration is a SQL script applied in order. The schema_version
/// table records which migrations have run.
pub const MIGRATIONS: &[&str] = &[
    // v1: watermarks and delivered ids
    r#"
-- Latest delivered publish time per feed address (upserted)
CREATE TABLE watermarks (
    feed_url      TEXT PRIMARY KEY,
    published_at  TEXT NOT NULL,
    updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Delivered entry ids; delivered_at is unix seconds for retention sweeps
CREATE TABLE delivered_entries (
    entry_id      TEXT PRIMARY KEY,
    delivered_at  INTEGER NOT NULL
);

CREATE INDEX idx_delivered_entries_delivered_at ON delivered_entries(delivered_at);
"#,
];
