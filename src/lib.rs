//! Nuntia - RSS feed ingestion and deduplication
//!
//! Fetches subscribed RSS/Atom feeds, normalizes their items into stories and
//! stores each story exactly once per feed.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;

pub use config::Config;
pub use db::Database;
pub use error::{NuntiaError, Result};
pub use feed::{
    Feed, FeedFetcher, FeedService, FeedSyncer, FeedUpdater, NormalizedStory, Story,
    StoryWithFeed, SyncReport, SyncSummary,
};
