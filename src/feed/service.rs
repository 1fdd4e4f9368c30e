//! Subscription service for Nuntia.
//!
//! High-level feed operations: subscribing (with the initial story import),
//! unsubscribing, listing and the reader-owned story flags.

use std::sync::Arc;

use tracing::{debug, info};

use super::repository::{FeedRepository, StoryRepository};
use super::sync::FeedSyncer;
use super::types::{Feed, FeedDocument, NewFeed, StoryWithFeed};
use crate::{NuntiaError, Result};

/// Service for feed subscriptions.
pub struct FeedService {
    syncer: Arc<FeedSyncer>,
}

impl FeedService {
    /// Create a new FeedService on top of a syncer.
    pub fn new(syncer: Arc<FeedSyncer>) -> Self {
        Self { syncer }
    }

    /// The syncer used for subscriptions.
    pub fn syncer(&self) -> &Arc<FeedSyncer> {
        &self.syncer
    }

    /// Subscribe `owner_id` to the feed at `url`.
    ///
    /// Fetches the feed first so that only working feeds are stored, then
    /// imports its current items.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` if the URL is malformed or not allowed
    /// - `DuplicateFeedSubscription` if the owner already has this URL
    /// - any fetch error (`FeedUnreachable`, `FetchTimeout`, `FeedUnparsable`)
    /// - `StoreWriteFailure` if the initial import fails; the feed stays
    ///   subscribed and the next refresh fills it
    pub async fn subscribe(&self, url: &str, owner_id: Option<&str>) -> Result<Feed> {
        let url = url.trim();
        self.syncer.fetcher().validate(url)?;

        let feed_repo = FeedRepository::new(self.syncer.db().pool());
        if feed_repo.get_by_owner_url(owner_id, url).await?.is_some() {
            return Err(duplicate(url, owner_id));
        }

        let document = self.syncer.fetcher().fetch(url).await?;

        let title = match document.title.trim() {
            "" => url,
            title => title,
        };
        let mut new_feed = NewFeed::new(url, owner_id.map(String::from)).with_title(title);
        if let Some(description) = &document.description {
            new_feed = new_feed.with_description(description.as_str());
        }
        if let Some(link) = &document.link {
            new_feed = new_feed.with_site_url(link.as_str());
        }
        if let Some(image) = &document.image {
            new_feed = new_feed.with_icon_url(image.as_str());
        }

        // A concurrent subscribe can win between the check and the insert
        let feed = feed_repo
            .create_or_ignore(&new_feed)
            .await?
            .ok_or_else(|| duplicate(url, owner_id))?;

        let inserted = self.import_initial(&feed, &document).await?;
        info!(feed_id = %feed.id, url, stories = inserted, "subscribed to feed");

        Ok(feed)
    }

    /// Import the subscribe-time document under the feed's sync guard.
    ///
    /// When a refresh already holds the feed, that refresh does the import.
    async fn import_initial(&self, feed: &Feed, document: &FeedDocument) -> Result<u64> {
        let _guard = match self.syncer.begin(&feed.id) {
            Ok(guard) => guard,
            Err(NuntiaError::SyncAlreadyRunning(_)) => {
                debug!(feed_id = %feed.id, "initial import left to running sync");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        Ok(self.syncer.ingest(feed, document).await?.inserted)
    }

    /// Remove a subscription and its stories.
    pub async fn unsubscribe(&self, feed_id: &str) -> Result<()> {
        let deleted = FeedRepository::new(self.syncer.db().pool())
            .delete(feed_id)
            .await?;
        if !deleted {
            return Err(NuntiaError::NotFound(format!("feed {feed_id}")));
        }
        info!(feed_id, "unsubscribed from feed");
        Ok(())
    }

    /// List an owner's feeds (newest first).
    pub async fn list_feeds(&self, owner_id: Option<&str>) -> Result<Vec<Feed>> {
        FeedRepository::new(self.syncer.db().pool())
            .list_by_owner(owner_id)
            .await
    }

    /// The newest stories across all feeds, joined with their feed.
    pub async fn recent_stories(&self, limit: usize) -> Result<Vec<StoryWithFeed>> {
        StoryRepository::new(self.syncer.db().pool())
            .recent(limit)
            .await
    }

    /// Mark a story read or unread.
    pub async fn set_read(&self, story_id: &str, is_read: bool) -> Result<()> {
        let updated = StoryRepository::new(self.syncer.db().pool())
            .set_read(story_id, is_read)
            .await?;
        if !updated {
            return Err(NuntiaError::NotFound(format!("story {story_id}")));
        }
        Ok(())
    }

    /// Save or unsave a story.
    pub async fn set_saved(&self, story_id: &str, is_saved: bool) -> Result<()> {
        let updated = StoryRepository::new(self.syncer.db().pool())
            .set_saved(story_id, is_saved)
            .await?;
        if !updated {
            return Err(NuntiaError::NotFound(format!("story {story_id}")));
        }
        Ok(())
    }
}

fn duplicate(url: &str, owner_id: Option<&str>) -> NuntiaError {
    NuntiaError::DuplicateFeedSubscription {
        url: url.to_string(),
        owner_id: owner_id.map(String::from),
    }
}
