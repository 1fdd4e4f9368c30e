//! Normalization of raw feed items into canonical stories.
//!
//! Normalization never fails: every field has a terminal default, so one
//! malformed item can't abort a feed's ingestion.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::feed::coerce::clean_string;
use crate::feed::types::{
    encode_categories, NormalizedStory, RawFeedItem, DEFAULT_STORY_TITLE, UNKNOWN_GUID,
};

/// Formats carrying an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
];

/// Formats without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Date-only formats; interpreted as midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

/// Zone names treated as UTC when trailing a naive timestamp.
const UTC_SUFFIXES: &[&str] = &[" UTC", " GMT", " UT", "Z"];

/// Normalize one raw item for the given feed.
///
/// `now` is the ingestion instant, used when the item carries no usable date.
pub fn normalize_item(item: &RawFeedItem, feed_id: &str, now: DateTime<Utc>) -> NormalizedStory {
    let raw_title = clean_string(item.title.as_ref()).trim().to_string();
    let link = item
        .link
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let guid = first_non_empty([
        item.guid.as_deref(),
        Some(link.as_str()),
        Some(raw_title.as_str()),
    ])
    .unwrap_or(UNKNOWN_GUID)
    .to_string();

    let title = if raw_title.is_empty() {
        DEFAULT_STORY_TITLE.to_string()
    } else {
        raw_title
    };

    let content = first_non_empty([
        item.content_encoded.as_deref(),
        item.content.as_deref(),
        item.content_snippet.as_deref(),
    ])
    .map(str::to_string);

    let pub_date = item
        .iso_date
        .as_deref()
        .and_then(parse_loose_date)
        .or_else(|| item.pub_date.as_deref().and_then(parse_loose_date))
        .unwrap_or(now);

    let author = Some(clean_string(item.author.as_ref()).trim().to_string())
        .filter(|a| !a.is_empty());

    NormalizedStory {
        feed_id: feed_id.to_string(),
        guid,
        title,
        link,
        pub_date,
        content,
        author,
        categories: normalize_categories(item),
    }
}

/// Normalize up to `limit` items of a document, in document order.
pub fn normalize_items(
    items: &[RawFeedItem],
    feed_id: &str,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<NormalizedStory> {
    items
        .iter()
        .take(limit)
        .map(|item| normalize_item(item, feed_id, now))
        .collect()
}

fn normalize_categories(item: &RawFeedItem) -> Option<String> {
    let mut categories: Vec<String> = Vec::new();
    for raw in &item.categories {
        let category = clean_string(Some(raw)).trim().to_string();
        if !category.is_empty() && !categories.contains(&category) {
            categories.push(category);
        }
    }
    encode_categories(&categories)
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
}

/// Parse a date string in any of the formats feeds commonly use.
///
/// Returns `None` rather than failing on anything unrecognised.
pub fn parse_loose_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive_input = UTC_SUFFIXES
        .iter()
        .find_map(|suffix| s.strip_suffix(suffix))
        .unwrap_or(s)
        .trim_end();
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_input, format) {
            return Some(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(naive_input, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    if (9..=11).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_guid_prefers_explicit_guid() {
        let item = RawFeedItem {
            guid: Some("g1".into()),
            link: Some("https://x/1".into()),
            title: Some(json!("T")),
            ..Default::default()
        };
        assert_eq!(normalize_item(&item, "f", now()).guid, "g1");
    }

    #[test]
    fn test_guid_falls_back_to_link() {
        let item = RawFeedItem {
            link: Some("https://x/1".into()),
            title: Some(json!("T")),
            ..Default::default()
        };
        assert_eq!(normalize_item(&item, "f", now()).guid, "https://x/1");
    }

    #[test]
    fn test_guid_falls_back_to_title() {
        let item = RawFeedItem {
            link: Some(String::new()),
            title: Some(json!("T")),
            ..Default::default()
        };
        assert_eq!(normalize_item(&item, "f", now()).guid, "T");
    }

    #[test]
    fn test_guid_unknown_when_everything_missing() {
        let item = RawFeedItem {
            guid: Some(String::new()),
            link: Some(String::new()),
            title: Some(json!("")),
            ..Default::default()
        };
        let story = normalize_item(&item, "f", now());
        assert_eq!(story.guid, "unknown");
        assert_eq!(story.title, "Untitled");
        assert_eq!(story.link, "");
    }

    #[test]
    fn test_title_from_text_node() {
        let item = RawFeedItem {
            title: Some(json!({"_": "Structured title", "$": {"type": "text"}})),
            ..Default::default()
        };
        assert_eq!(normalize_item(&item, "f", now()).title, "Structured title");
    }

    #[test]
    fn test_content_priority() {
        let item = RawFeedItem {
            content_encoded: Some("<p>full</p>".into()),
            content: Some("summary".into()),
            content_snippet: Some("snippet".into()),
            ..Default::default()
        };
        assert_eq!(
            normalize_item(&item, "f", now()).content.as_deref(),
            Some("<p>full</p>")
        );

        let item = RawFeedItem {
            content_encoded: Some("  ".into()),
            content_snippet: Some("snippet".into()),
            ..Default::default()
        };
        assert_eq!(
            normalize_item(&item, "f", now()).content.as_deref(),
            Some("snippet")
        );

        assert!(normalize_item(&RawFeedItem::default(), "f", now())
            .content
            .is_none());
    }

    #[test]
    fn test_iso_date_preferred() {
        let item = RawFeedItem {
            iso_date: Some("2024-10-21T07:28:00Z".into()),
            pub_date: Some("Tue, 01 Jan 2019 00:00:00 GMT".into()),
            ..Default::default()
        };
        assert_eq!(
            normalize_item(&item, "f", now()).pub_date,
            Utc.with_ymd_and_hms(2024, 10, 21, 7, 28, 0).unwrap()
        );
    }

    #[test]
    fn test_bad_iso_date_falls_through_to_pub_date() {
        let item = RawFeedItem {
            iso_date: Some("garbage".into()),
            pub_date: Some("Mon, 21 Oct 2024 07:28:00 GMT".into()),
            ..Default::default()
        };
        assert_eq!(
            normalize_item(&item, "f", now()).pub_date,
            Utc.with_ymd_and_hms(2024, 10, 21, 7, 28, 0).unwrap()
        );
    }

    #[test]
    fn test_unparseable_date_uses_ingestion_instant() {
        let item = RawFeedItem {
            pub_date: Some("not-a-date".into()),
            ..Default::default()
        };
        assert_eq!(normalize_item(&item, "f", now()).pub_date, now());
    }

    #[test]
    fn test_author_coercion() {
        let cases = [
            (Some(json!({"_": "Jane Doe"})), Some("Jane Doe")),
            (Some(json!({"name": "Jane Doe"})), Some("Jane Doe")),
            (Some(json!("Jane Doe")), Some("Jane Doe")),
            (None, None),
        ];
        for (raw, expected) in cases {
            let item = RawFeedItem {
                author: raw,
                ..Default::default()
            };
            assert_eq!(normalize_item(&item, "f", now()).author.as_deref(), expected);
        }
    }

    #[test]
    fn test_categories_serialized() {
        let item = RawFeedItem {
            categories: vec![json!("Rust"), json!({"_": "Linux"}), json!(""), json!("Rust")],
            ..Default::default()
        };
        assert_eq!(
            normalize_item(&item, "f", now()).categories.as_deref(),
            Some(r#"["Rust","Linux"]"#)
        );
    }

    #[test]
    fn test_empty_categories_left_unset() {
        let item = RawFeedItem {
            categories: vec![json!(""), json!(null)],
            ..Default::default()
        };
        assert!(normalize_item(&item, "f", now()).categories.is_none());
    }

    #[test]
    fn test_normalize_items_respects_limit() {
        let items: Vec<RawFeedItem> = (0..5)
            .map(|i| RawFeedItem {
                guid: Some(format!("g{i}")),
                ..Default::default()
            })
            .collect();
        let stories = normalize_items(&items, "feed-1", now(), 3);
        assert_eq!(stories.len(), 3);
        assert_eq!(stories[2].guid, "g2");
        assert!(stories.iter().all(|s| s.feed_id == "feed-1"));
    }

    #[test]
    fn test_parse_loose_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        for input in [
            "2024-01-15T10:30:00Z",
            "2024-01-15T19:30:00+09:00",
            "Mon, 15 Jan 2024 10:30:00 GMT",
            "Mon, 15 Jan 2024 10:30:00 +0000",
            "15 Jan 2024 10:30:00 +0000",
            "2024-01-15 10:30:00",
            "2024-01-15 10:30:00 UTC",
            "2024-01-15T10:30:00",
            "2024/01/15 10:30:00",
            "1705314600",
        ] {
            assert_eq!(parse_loose_date(input), Some(expected), "input: {input}");
        }
    }

    #[test]
    fn test_parse_loose_date_only() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_loose_date("2024-01-15"), Some(midnight));
        assert_eq!(parse_loose_date("January 15, 2024"), Some(midnight));
    }

    #[test]
    fn test_parse_loose_date_rejects_garbage() {
        assert_eq!(parse_loose_date(""), None);
        assert_eq!(parse_loose_date("not-a-date"), None);
        assert_eq!(parse_loose_date("2024-13-45"), None);
    }
}
