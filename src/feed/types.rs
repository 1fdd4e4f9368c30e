//! Feed and story types for Nuntia.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Title given to stories whose feed item has none.
pub const DEFAULT_STORY_TITLE: &str = "Untitled";

/// Identity key of a story with no guid, link or title.
pub const UNKNOWN_GUID: &str = "unknown";

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    /// Feed ID (UUID).
    pub id: String,
    /// Feed URL.
    pub url: String,
    /// Owner of the subscription; `None` for single-user installs.
    pub owner_id: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Feed description.
    pub description: Option<String>,
    /// Site URL (the website the feed belongs to).
    pub site_url: Option<String>,
    /// Icon URL.
    pub icon_url: Option<String>,
    /// When the feed was subscribed.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Feed URL.
    pub url: String,
    /// Owner of the subscription.
    pub owner_id: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Feed description.
    pub description: Option<String>,
    /// Site URL.
    pub site_url: Option<String>,
    /// Icon URL.
    pub icon_url: Option<String>,
}

impl NewFeed {
    /// Create a new feed for the given URL and owner.
    pub fn new(url: impl Into<String>, owner_id: Option<String>) -> Self {
        Self {
            url: url.into(),
            owner_id,
            title: None,
            description: None,
            site_url: None,
            icon_url: None,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the site URL.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    /// Set the icon URL.
    pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }
}

/// A fetched and parsed feed document.
#[derive(Debug, Clone, Default)]
pub struct FeedDocument {
    /// Feed title (empty when the document has none).
    pub title: String,
    /// Feed description.
    pub description: Option<String>,
    /// Canonical site link.
    pub link: Option<String>,
    /// Icon or logo URL.
    pub image: Option<String>,
    /// Items in document order.
    pub items: Vec<RawFeedItem>,
}

/// One entry of a feed document before normalization.
///
/// Everything is optional. `title`, `author` and `categories` keep the loose
/// shapes found in the wild: a plain string, or an object carrying the text
/// under a key such as `_` or `name`.
#[derive(Debug, Clone, Default)]
pub struct RawFeedItem {
    /// Item title.
    pub title: Option<Value>,
    /// Link to the article.
    pub link: Option<String>,
    /// Loosely formatted publish date.
    pub pub_date: Option<String>,
    /// ISO-8601 publish date.
    pub iso_date: Option<String>,
    /// Full content (`content:encoded` or Atom content), possibly HTML.
    pub content_encoded: Option<String>,
    /// Plain content field (RSS description or Atom summary), possibly HTML.
    pub content: Option<String>,
    /// Short plain-text snippet.
    pub content_snippet: Option<String>,
    /// Feed-supplied unique identifier.
    pub guid: Option<String>,
    /// Author, as a string or a structured node.
    pub author: Option<Value>,
    /// Categories, each a string or a structured node.
    pub categories: Vec<Value>,
}

/// A story in canonical form, ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedStory {
    /// Feed this story belongs to.
    pub feed_id: String,
    /// Identity key, unique per feed.
    pub guid: String,
    /// Title, never empty.
    pub title: String,
    /// Link, possibly empty.
    pub link: String,
    /// Publish timestamp.
    pub pub_date: DateTime<Utc>,
    /// Content, possibly HTML.
    pub content: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// JSON array of category strings, e.g. `["Rust","Linux"]`.
    pub categories: Option<String>,
}

impl NormalizedStory {
    /// Decode the stored category list.
    pub fn category_list(&self) -> Vec<String> {
        decode_categories(self.categories.as_deref())
    }
}

/// A stored story.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    /// Story ID (UUID).
    pub id: String,
    /// Feed ID.
    pub feed_id: String,
    /// Identity key.
    pub guid: String,
    /// Title.
    pub title: String,
    /// Link.
    pub link: String,
    /// Publish timestamp.
    pub pub_date: DateTime<Utc>,
    /// Content.
    pub content: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// JSON array of category strings.
    pub categories: Option<String>,
    /// Read flag, owned by the reader.
    pub is_read: bool,
    /// Saved flag, owned by the reader.
    pub is_saved: bool,
    /// When the story was first stored.
    pub created_at: DateTime<Utc>,
}

impl Story {
    /// Decode the stored category list.
    pub fn category_list(&self) -> Vec<String> {
        decode_categories(self.categories.as_deref())
    }
}

/// The feed fields shown next to a story.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSummary {
    /// Feed ID.
    pub id: String,
    /// Feed title.
    pub title: Option<String>,
    /// Feed URL.
    pub url: String,
    /// Icon URL.
    pub icon_url: Option<String>,
}

/// A story joined with its feed, as listed by the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryWithFeed {
    /// The story.
    pub story: Story,
    /// The feed it came from.
    pub feed: FeedSummary,
}

/// Encode a category list for storage; an empty list is stored as `None`.
pub fn encode_categories(categories: &[String]) -> Option<String> {
    if categories.is_empty() {
        return None;
    }
    serde_json::to_string(categories).ok()
}

/// Decode a stored category column. Malformed values decode to an empty list.
pub fn decode_categories(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_feed_builder() {
        let feed = NewFeed::new("https://example.com/feed.xml", Some("alice".into()))
            .with_title("Example")
            .with_site_url("https://example.com")
            .with_icon_url("https://example.com/icon.png");
        assert_eq!(feed.url, "https://example.com/feed.xml");
        assert_eq!(feed.owner_id.as_deref(), Some("alice"));
        assert_eq!(feed.title.as_deref(), Some("Example"));
        assert!(feed.description.is_none());
        assert_eq!(feed.icon_url.as_deref(), Some("https://example.com/icon.png"));
    }

    #[test]
    fn test_encode_categories() {
        let cats = vec!["Rust".to_string(), "Linux".to_string()];
        assert_eq!(
            encode_categories(&cats),
            Some(r#"["Rust","Linux"]"#.to_string())
        );
        assert_eq!(encode_categories(&[]), None);
    }

    #[test]
    fn test_decode_categories() {
        assert_eq!(
            decode_categories(Some(r#"["AI","Web"]"#)),
            vec!["AI".to_string(), "Web".to_string()]
        );
        assert!(decode_categories(None).is_empty());
        assert!(decode_categories(Some("not json")).is_empty());
    }
}
