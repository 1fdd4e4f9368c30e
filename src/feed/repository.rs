//! Feed and story repositories for Nuntia.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

use super::types::{Feed, FeedSummary, NewFeed, NormalizedStory, Story, StoryWithFeed};
use crate::db::{DbBackend, DbPool};
use crate::{NuntiaError, Result};

/// Rows per multi-row INSERT. At ten binds per row this stays under the
/// 999-variable limit of older SQLite builds.
const INSERT_CHUNK_SIZE: usize = 90;

const FEED_COLUMNS: &str =
    "id, url, owner_id, title, description, site_url, icon_url, created_at, updated_at";

const STORY_COLUMNS: &str = "id, feed_id, guid, title, link, pub_date, content, author, \
                             categories, is_read, is_saved, created_at";

/// Row type for feed from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: String,
    url: String,
    owner_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    site_url: Option<String>,
    icon_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            url: row.url,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            site_url: row.site_url,
            icon_url: row.icon_url,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_datetime(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for story from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StoryRow {
    id: String,
    feed_id: String,
    guid: String,
    title: String,
    link: String,
    pub_date: String,
    content: Option<String>,
    author: Option<String>,
    categories: Option<String>,
    is_read: bool,
    is_saved: bool,
    created_at: String,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        let created_at = parse_datetime(&row.created_at).unwrap_or_else(Utc::now);
        Story {
            id: row.id,
            feed_id: row.feed_id,
            guid: row.guid,
            title: row.title,
            link: row.link,
            pub_date: parse_datetime(&row.pub_date).unwrap_or(created_at),
            content: row.content,
            author: row.author,
            categories: row.categories,
            is_read: row.is_read,
            is_saved: row.is_saved,
            created_at,
        }
    }
}

/// Row type for story joined with its feed.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StoryWithFeedRow {
    #[sqlx(flatten)]
    story: StoryRow,
    feed_title: Option<String>,
    feed_url: String,
    feed_icon_url: Option<String>,
}

impl From<StoryWithFeedRow> for StoryWithFeed {
    fn from(row: StoryWithFeedRow) -> Self {
        let feed = FeedSummary {
            id: row.story.feed_id.clone(),
            title: row.feed_title,
            url: row.feed_url,
            icon_url: row.feed_icon_url,
        };
        StoryWithFeed {
            story: row.story.into(),
            feed,
        }
    }
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a feed unless `(url, owner_id)` is already subscribed.
    ///
    /// Returns `None` when an existing subscription blocked the insert.
    pub async fn create_or_ignore(&self, feed: &NewFeed) -> Result<Option<Feed>> {
        let id = Uuid::new_v4().to_string();
        let now = format_datetime(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO feeds (id, url, owner_id, title, description, site_url, icon_url,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&feed.url)
        .bind(&feed.owner_id)
        .bind(&feed.title)
        .bind(&feed.description)
        .bind(&feed.site_url)
        .bind(&feed.icon_url)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(&id).await
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(row.map(Feed::from))
    }

    /// Get an owner's subscription to a URL.
    pub async fn get_by_owner_url(&self, owner_id: Option<&str>, url: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds \
             WHERE url = $1 AND COALESCE(owner_id, '') = COALESCE($2, '')"
        ))
        .bind(url)
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(row.map(Feed::from))
    }

    /// List all feeds (newest first).
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at DESC, id"
        ))
        .fetch_all(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// List an owner's feeds (newest first). `None` selects ownerless feeds.
    pub async fn list_by_owner(&self, owner_id: Option<&str>) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds \
             WHERE COALESCE(owner_id, '') = COALESCE($1, '') \
             ORDER BY created_at DESC, id"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Delete a feed and, by cascade, its stories.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await
            .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(count.0)
    }
}

/// Repository for story operations.
pub struct StoryRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> StoryRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert stories for a feed, skipping any whose `(feed_id, guid)` is
    /// already stored.
    ///
    /// Returns the number of rows actually inserted.
    pub async fn insert_skipping_duplicates(
        &self,
        feed_id: &str,
        stories: &[NormalizedStory],
    ) -> Result<u64> {
        let now = format_datetime(Utc::now());
        let mut inserted = 0;

        for chunk in stories.chunks(INSERT_CHUNK_SIZE) {
            let mut query: QueryBuilder<DbBackend> = QueryBuilder::new(
                "INSERT INTO stories (id, feed_id, guid, title, link, pub_date, content, \
                 author, categories, created_at) ",
            );
            query.push_values(chunk, |mut row, story| {
                row.push_bind(Uuid::new_v4().to_string())
                    .push_bind(feed_id.to_string())
                    .push_bind(story.guid.clone())
                    .push_bind(story.title.clone())
                    .push_bind(story.link.clone())
                    .push_bind(format_datetime(story.pub_date))
                    .push_bind(story.content.clone())
                    .push_bind(story.author.clone())
                    .push_bind(story.categories.clone())
                    .push_bind(now.clone());
            });
            query.push(" ON CONFLICT (feed_id, guid) DO NOTHING");

            let result = query
                .build()
                .execute(self.pool)
                .await
                .map_err(|e| NuntiaError::Database(e.to_string()))?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    /// Guids already stored for a feed.
    pub async fn list_existing_guids(&self, feed_id: &str) -> Result<HashSet<String>> {
        let guids: Vec<String> = sqlx::query_scalar("SELECT guid FROM stories WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(guids.into_iter().collect())
    }

    /// Get a story by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Story>> {
        let row = sqlx::query_as::<_, StoryRow>(&format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(row.map(Story::from))
    }

    /// List stories for a feed (newest first).
    pub async fn list_by_feed(&self, feed_id: &str, limit: usize) -> Result<Vec<Story>> {
        let rows = sqlx::query_as::<_, StoryRow>(&format!(
            "SELECT {STORY_COLUMNS} FROM stories \
             WHERE feed_id = $1 \
             ORDER BY pub_date DESC, id \
             LIMIT $2"
        ))
        .bind(feed_id)
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Story::from).collect())
    }

    /// Count stories for a feed.
    pub async fn count_by_feed(&self, feed_id: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(count.0)
    }

    /// Most recent stories across all feeds, joined with their feed.
    pub async fn recent(&self, limit: usize) -> Result<Vec<StoryWithFeed>> {
        let rows = sqlx::query_as::<_, StoryWithFeedRow>(
            r#"
            SELECT s.id, s.feed_id, s.guid, s.title, s.link, s.pub_date, s.content, s.author,
                   s.categories, s.is_read, s.is_saved, s.created_at,
                   f.title AS feed_title, f.url AS feed_url, f.icon_url AS feed_icon_url
            FROM stories s
            INNER JOIN feeds f ON f.id = s.feed_id
            ORDER BY s.pub_date DESC, s.id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await
        .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(StoryWithFeed::from).collect())
    }

    /// Set the read flag. Returns false when the story does not exist.
    pub async fn set_read(&self, id: &str, is_read: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE stories SET is_read = $1 WHERE id = $2")
            .bind(is_read)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the saved flag. Returns false when the story does not exist.
    pub async fn set_saved(&self, id: &str, is_saved: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE stories SET is_saved = $1 WHERE id = $2")
            .bind(is_saved)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| NuntiaError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Fixed-width RFC 3339 in UTC so stored timestamps sort as text.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}
