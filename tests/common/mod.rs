//! Test helpers for integration tests.
//!
//! Provides an in-memory store wired to a fetcher that may reach the local
//! mock server, plus RSS document builders.

#![allow(dead_code)]

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nuntia::config::{FetchConfig, SyncConfig};
use nuntia::feed::{Feed, FeedRepository, NewFeed, StoryRepository};
use nuntia::{Database, FeedFetcher, FeedService, FeedSyncer};

/// Store, syncer and service sharing one in-memory database.
pub struct TestApp {
    pub db: Arc<Database>,
    pub syncer: Arc<FeedSyncer>,
    pub service: FeedService,
}

impl TestApp {
    /// Build with default sync settings.
    pub async fn new() -> Self {
        Self::with_config(test_fetch_config(), SyncConfig::default()).await
    }

    /// Build with the given fetch and sync settings.
    pub async fn with_config(fetch: FetchConfig, sync: SyncConfig) -> Self {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let fetcher = FeedFetcher::new(&fetch).unwrap();
        let syncer = Arc::new(FeedSyncer::new(db.clone(), fetcher, sync));
        let service = FeedService::new(syncer.clone());
        Self {
            db,
            syncer,
            service,
        }
    }

    /// Insert a feed row directly, bypassing the subscribe fetch.
    pub async fn add_feed(&self, url: &str) -> Feed {
        FeedRepository::new(self.db.pool())
            .create_or_ignore(&NewFeed::new(url, None))
            .await
            .unwrap()
            .unwrap()
    }

    /// Number of stored stories for a feed.
    pub async fn story_count(&self, feed_id: &str) -> i64 {
        StoryRepository::new(self.db.pool())
            .count_by_feed(feed_id)
            .await
            .unwrap()
    }
}

/// Fetch settings that allow the loopback mock server.
pub fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        total_timeout_secs: 2,
        allow_private_hosts: true,
        ..FetchConfig::default()
    }
}

/// One RSS item: `(guid, title, link)`. Empty strings omit the element.
pub type Item<'a> = (&'a str, &'a str, &'a str);

/// Build an RSS 2.0 document.
pub fn rss(title: &str, items: &[Item<'_>]) -> String {
    let mut body = String::new();
    for (guid, item_title, link) in items {
        body.push_str("    <item>\n");
        if !item_title.is_empty() {
            body.push_str(&format!("      <title>{item_title}</title>\n"));
        }
        if !link.is_empty() {
            body.push_str(&format!("      <link>{link}</link>\n"));
        }
        if !guid.is_empty() {
            body.push_str(&format!(
                "      <guid isPermaLink=\"false\">{guid}</guid>\n"
            ));
        }
        body.push_str("      <pubDate>Tue, 07 Jan 2025 10:00:00 GMT</pubDate>\n");
        body.push_str("    </item>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{title}</title>
    <link>https://example.com/</link>
    <description>Test feed</description>
{body}  </channel>
</rss>"#
    )
}

/// Serve `body` as an RSS document at `route`.
pub async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Serve a bare status code at `route`.
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
