//! Feed ingestion module for Nuntia.
//!
//! Fetches RSS/Atom feeds, normalizes their items into stories and merges
//! them into the store without duplicates.

pub mod coerce;
pub mod dedup;
pub mod fetcher;
pub mod normalizer;
pub mod repository;
pub mod service;
pub mod sync;
pub mod topics;
pub mod types;
pub mod updater;

pub use coerce::clean_string;
pub use dedup::{merge_stories, plan_merge};
pub use fetcher::{parse_feed, validate_url, FeedFetcher};
pub use normalizer::{normalize_item, normalize_items, parse_loose_date};
pub use repository::{FeedRepository, StoryRepository};
pub use service::FeedService;
pub use sync::{FeedSyncer, SyncReport, SyncSummary};
pub use topics::{detect_topics, infer_missing_topics};
pub use types::{
    decode_categories, encode_categories, Feed, FeedDocument, FeedSummary, NewFeed,
    NormalizedStory, RawFeedItem, Story, StoryWithFeed, DEFAULT_STORY_TITLE, UNKNOWN_GUID,
};
pub use updater::{start_feed_updater, FeedUpdater};
