//! Database schema and migrations for Nuntia.
//!
//! Migrations are applied in order when the database is opened. The SQL is
//! kept to the subset SQLite and PostgreSQL share.

/// Database migrations.
///
/// Each entry is one migration; the `schema_version` table records which ones
/// have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Feeds
    r#"
CREATE TABLE feeds (
    id          TEXT PRIMARY KEY,
    url         TEXT NOT NULL,
    owner_id    TEXT,                    -- NULL for single-user installs
    title       TEXT,
    description TEXT,
    site_url    TEXT,
    icon_url    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- One subscription per (url, owner); a missing owner counts as one owner
CREATE UNIQUE INDEX idx_feeds_url_owner ON feeds(url, COALESCE(owner_id, ''));
CREATE INDEX idx_feeds_owner_id ON feeds(owner_id);
"#,
    // v2: Stories
    r#"
CREATE TABLE stories (
    id          TEXT PRIMARY KEY,
    feed_id     TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    guid        TEXT NOT NULL,
    title       TEXT NOT NULL,
    link        TEXT NOT NULL,
    pub_date    TEXT NOT NULL,
    content     TEXT,
    author      TEXT,
    categories  TEXT,                    -- JSON array of strings, NULL when none
    is_read     BOOLEAN NOT NULL DEFAULT FALSE,
    is_saved    BOOLEAN NOT NULL DEFAULT FALSE,
    created_at  TEXT NOT NULL,
    UNIQUE(feed_id, guid)
);

CREATE INDEX idx_stories_pub_date ON stories(pub_date);
CREATE INDEX idx_stories_feed_id ON stories(feed_id);
"#,
];
