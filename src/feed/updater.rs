//! Periodic feed refresh for Nuntia.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use super::sync::{FeedSyncer, SyncReport};
use crate::Result;

/// Background refresher that syncs every feed on a fixed interval.
pub struct FeedUpdater {
    syncer: Arc<FeedSyncer>,
    refresh_interval: Duration,
}

impl FeedUpdater {
    /// Create a new updater refreshing every `interval_secs` seconds.
    pub fn new(syncer: Arc<FeedSyncer>, interval_secs: u64) -> Self {
        Self {
            syncer,
            refresh_interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// The refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Run the refresh loop forever. The first cycle starts immediately.
    pub async fn run(&self) {
        info!(
            "Feed updater started (interval: {} seconds)",
            self.refresh_interval.as_secs()
        );

        let mut timer = interval(self.refresh_interval);
        // A slow cycle must not trigger a burst of catch-up cycles
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            if let Err(e) = self.run_once().await {
                error!("Feed refresh failed: {}", e);
            }
        }
    }

    /// Run one refresh cycle over every subscribed feed.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let report = self.syncer.sync_everything().await?;
        if !report.results.is_empty() {
            info!(
                "Refreshed {} feed(s): {} new stories, {} failed",
                report.results.len(),
                report.total_inserted(),
                report.failed()
            );
        }
        Ok(report)
    }
}

/// Spawn the updater on the runtime. Abort the handle to stop it.
pub fn start_feed_updater(syncer: Arc<FeedSyncer>, interval_secs: u64) -> JoinHandle<()> {
    let updater = FeedUpdater::new(syncer, interval_secs);
    tokio::spawn(async move {
        updater.run().await;
    })
}
