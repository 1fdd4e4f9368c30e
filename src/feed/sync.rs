//! Sync orchestration for Nuntia.
//!
//! Runs fetch, normalize and merge for each subscribed feed. Feeds are
//! synced independently: one feed failing never affects another.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument};

use super::dedup::merge_stories;
use super::fetcher::FeedFetcher;
use super::normalizer::normalize_items;
use super::repository::FeedRepository;
use super::topics::infer_missing_topics;
use super::types::{Feed, FeedDocument};
use crate::config::SyncConfig;
use crate::db::Database;
use crate::{NuntiaError, Result};

/// Slack added on top of the HTTP client's own timeout.
const FETCH_TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// Result of syncing one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Items taken from the document (after the per-feed cap).
    pub fetched: usize,
    /// Stories newly inserted.
    pub inserted: u64,
}

/// Per-feed results of a sync run, keyed by feed ID.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Outcome per feed.
    pub results: HashMap<String, Result<SyncSummary>>,
}

impl SyncReport {
    /// Total stories inserted across all feeds.
    pub fn total_inserted(&self) -> u64 {
        self.results
            .values()
            .filter_map(|r| r.as_ref().ok())
            .map(|s| s.inserted)
            .sum()
    }

    /// Number of feeds that synced.
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    /// Number of feeds that failed.
    pub fn failed(&self) -> usize {
        self.results.values().filter(|r| r.is_err()).count()
    }

    /// Failed feeds with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &NuntiaError)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id.as_str(), e)))
    }

    /// Outcome for one feed.
    pub fn get(&self, feed_id: &str) -> Option<&Result<SyncSummary>> {
        self.results.get(feed_id)
    }
}

/// Feed sync orchestrator.
///
/// Holds the store handle and fetcher explicitly; at most one sync per feed
/// runs at a time.
pub struct FeedSyncer {
    db: Arc<Database>,
    fetcher: FeedFetcher,
    config: SyncConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl FeedSyncer {
    /// Create a new syncer.
    pub fn new(db: Arc<Database>, fetcher: FeedFetcher, config: SyncConfig) -> Self {
        Self {
            db,
            fetcher,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// The fetcher used for every sync.
    pub fn fetcher(&self) -> &FeedFetcher {
        &self.fetcher
    }

    /// The database handle.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Fetch, normalize and merge one feed.
    pub async fn sync_feed(&self, feed: &Feed) -> Result<SyncSummary> {
        let _guard = self.begin(&feed.id)?;
        let span = info_span!("sync_feed", feed_id = %feed.id, url = %feed.url);

        async {
            let fetch_limit = self.fetcher.timeout() + FETCH_TIMEOUT_GRACE;
            let document = timeout(fetch_limit, self.fetcher.fetch(&feed.url))
                .await
                .map_err(|_| {
                    NuntiaError::FetchTimeout(format!(
                        "{}: no response within {}s",
                        feed.url,
                        fetch_limit.as_secs()
                    ))
                })??;

            self.ingest(feed, &document).await
        }
        .instrument(span)
        .await
    }

    /// Normalize and merge an already fetched document for `feed`.
    pub async fn ingest(&self, feed: &Feed, document: &FeedDocument) -> Result<SyncSummary> {
        let mut stories = normalize_items(
            &document.items,
            &feed.id,
            Utc::now(),
            self.config.max_stories_per_feed,
        );
        if self.config.infer_topics {
            infer_missing_topics(&mut stories);
        }
        let fetched = stories.len();

        let inserted = timeout(
            self.config.merge_timeout(),
            merge_stories(self.db.pool(), &feed.id, stories),
        )
        .await
        .map_err(|_| {
            NuntiaError::StoreWriteFailure(format!(
                "feed {}: merge timed out after {}s",
                feed.id, self.config.merge_timeout_secs
            ))
        })??;

        if inserted > 0 {
            info!(feed_id = %feed.id, fetched, inserted, "feed synced");
        } else {
            debug!(feed_id = %feed.id, fetched, "feed synced: no new stories");
        }

        Ok(SyncSummary { fetched, inserted })
    }

    /// Sync a set of feeds with bounded concurrency.
    ///
    /// Every feed gets an entry in the report; failures are recorded, never
    /// propagated.
    pub async fn sync_all(&self, feeds: &[Feed]) -> SyncReport {
        let concurrency = self.config.concurrency.max(1);
        debug!(feeds = feeds.len(), concurrency, "syncing feeds");

        let futures: Vec<_> = feeds
            .iter()
            .map(|feed| self.sync_logged(feed).boxed())
            .collect();
        let results: HashMap<String, Result<SyncSummary>> =
            stream::iter(futures)
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let report = SyncReport { results };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            inserted = report.total_inserted(),
            "sync run complete"
        );
        report
    }

    async fn sync_logged(&self, feed: &Feed) -> (String, Result<SyncSummary>) {
        let result = self.sync_feed(feed).await;
        if let Err(e) = &result {
            warn!(feed_id = %feed.id, url = %feed.url, error = %e, "feed sync failed");
        }
        (feed.id.clone(), result)
    }

    /// Sync every subscribed feed.
    pub async fn sync_everything(&self) -> Result<SyncReport> {
        let feeds = FeedRepository::new(self.db.pool()).list_all().await?;
        Ok(self.sync_all(&feeds).await)
    }

    /// Sync one owner's feeds. `None` selects ownerless feeds.
    pub async fn sync_owner(&self, owner_id: Option<&str>) -> Result<SyncReport> {
        let feeds = FeedRepository::new(self.db.pool())
            .list_by_owner(owner_id)
            .await?;
        Ok(self.sync_all(&feeds).await)
    }

    /// Mark `feed_id` as syncing until the guard is dropped.
    pub(crate) fn begin(&self, feed_id: &str) -> Result<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(feed_id.to_string()) {
            return Err(NuntiaError::SyncAlreadyRunning(feed_id.to_string()));
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            feed_id: feed_id.to_string(),
        })
    }
}

/// Marks a feed as syncing until dropped.
pub(crate) struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    feed_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.feed_id);
    }
}
