//! Feed document fetcher and parser.
//!
//! Fetches RSS/Atom documents over HTTP with timeouts, a size limit and SSRF
//! protection, and parses them into [`FeedDocument`]s.

use std::net::IpAddr;
use std::time::Duration;

use feed_rs::model::{Category, Entry, Link, Person};
use feed_rs::parser;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{NuntiaError, Result};
use crate::feed::types::{FeedDocument, RawFeedItem};

/// Feed fetcher holding a configured HTTP client.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    timeout: Duration,
    max_feed_size: u64,
    max_snippet_length: usize,
    allow_private_hosts: bool,
}

impl FeedFetcher {
    /// Create a fetcher from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let timeout = config.total_timeout();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| NuntiaError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            max_feed_size: config.max_feed_size_bytes,
            max_snippet_length: config.max_snippet_length,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    /// Total request timeout applied to every fetch.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate a URL against this fetcher's host policy.
    pub fn validate(&self, url: &str) -> Result<()> {
        validate_url(url, self.allow_private_hosts)
    }

    /// Fetch and parse the feed at `url`.
    ///
    /// Fails with `FetchTimeout` when the request exceeds the timeout,
    /// `FeedUnreachable` on network or HTTP status errors and
    /// `FeedUnparsable` when the body is not a feed.
    pub async fn fetch(&self, url: &str) -> Result<FeedDocument> {
        self.validate(url)?;
        debug!(url, "fetching feed");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        if !response.status().is_success() {
            return Err(NuntiaError::FeedUnreachable(format!(
                "{url}: HTTP {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(too_large(url, content_length, self.max_feed_size));
            }
        }

        let bytes = response.bytes().await.map_err(|e| request_error(url, e))?;
        if bytes.len() as u64 > self.max_feed_size {
            return Err(too_large(url, bytes.len() as u64, self.max_feed_size));
        }

        parse_feed(&bytes, self.max_snippet_length)
            .map_err(|e| NuntiaError::FeedUnparsable(format!("{url}: {e}")))
    }
}

fn request_error(url: &str, e: reqwest::Error) -> NuntiaError {
    if e.is_timeout() {
        NuntiaError::FetchTimeout(format!("{url}: {e}"))
    } else {
        NuntiaError::FeedUnreachable(format!("{url}: {e}"))
    }
}

fn too_large(url: &str, size: u64, max: u64) -> NuntiaError {
    NuntiaError::FeedUnparsable(format!(
        "{url}: feed too large: {size} bytes (max {max} bytes)"
    ))
}

/// Validate a feed URL.
///
/// The URL must parse, use http or https and name a host. Unless
/// `allow_private_hosts` is set, loopback, private and reserved hosts are
/// rejected.
pub fn validate_url(url: &str, allow_private_hosts: bool) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| NuntiaError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(NuntiaError::InvalidUrl(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| NuntiaError::InvalidUrl(format!("{url}: URL has no host")))?;

    if allow_private_hosts {
        return Ok(());
    }

    match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(NuntiaError::InvalidUrl(format!("forbidden host: {domain}")));
            }
        }
        url::Host::Ipv4(ipv4) => check_ip(IpAddr::V4(ipv4))?,
        url::Host::Ipv6(ipv6) => check_ip(IpAddr::V6(ipv6))?,
    }

    Ok(())
}

fn check_ip(ip: IpAddr) -> Result<()> {
    if is_private_ip(&ip) {
        return Err(NuntiaError::InvalidUrl(format!(
            "private IP address not allowed: {ip}"
        )));
    }
    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: &[&str] = &[".local", ".localhost", ".internal", ".lan", ".home"];

    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|s| host.ends_with(s))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
                || ipv6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

/// Parse feed bytes into a [`FeedDocument`].
///
/// The whole document parses or the call fails. Missing item ids are kept
/// as `None` instead of being synthesized.
pub fn parse_feed(bytes: &[u8], max_snippet_length: usize) -> Result<FeedDocument> {
    let parser = parser::Builder::new()
        .id_generator(|_links, _title, _base| String::new())
        .build();
    let feed = parser
        .parse(bytes)
        .map_err(|e| NuntiaError::FeedUnparsable(format!("failed to parse feed: {e}")))?;

    let title = feed.title.map(|t| t.content).unwrap_or_default();
    let description = feed
        .description
        .map(|d| strip_html(&d.content))
        .filter(|d| !d.is_empty());
    let link = preferred_link(&feed.links);
    let image = feed.logo.or(feed.icon).map(|image| image.uri);

    let items = feed
        .entries
        .into_iter()
        .map(|entry| raw_item(entry, max_snippet_length))
        .collect();

    Ok(FeedDocument {
        title,
        description,
        link,
        image,
        items,
    })
}

fn raw_item(entry: Entry, max_snippet_length: usize) -> RawFeedItem {
    let guid = Some(entry.id).filter(|id| !id.trim().is_empty());
    let link = preferred_link(&entry.links);
    let content = entry.summary.map(|t| t.content);
    let content_encoded = entry.content.and_then(|c| c.body);
    let content_snippet = content
        .as_deref()
        .or(content_encoded.as_deref())
        .map(|html| truncate(&strip_html(html), max_snippet_length))
        .filter(|s| !s.is_empty());

    RawFeedItem {
        title: entry.title.map(|t| Value::String(t.content)),
        link,
        pub_date: entry.updated.map(|dt| dt.to_rfc3339()),
        iso_date: entry.published.map(|dt| dt.to_rfc3339()),
        content_encoded,
        content,
        content_snippet,
        guid,
        author: entry.authors.first().map(person_value),
        categories: entry.categories.iter().map(category_value).collect(),
    }
}

/// The `alternate` link if there is one, else the first link.
fn preferred_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

/// A bare name stays a string; a person with contact details becomes a node.
fn person_value(person: &Person) -> Value {
    // RSS 2.0 <author> text arrives as email under the placeholder name "author"
    if person.name == "author" && person.uri.is_none() {
        if let Some(text) = &person.email {
            return Value::String(rss_author_name(text));
        }
    }
    if person.email.is_none() && person.uri.is_none() {
        return Value::String(person.name.clone());
    }
    let mut node = Map::new();
    node.insert("name".into(), Value::String(person.name.clone()));
    if let Some(email) = &person.email {
        node.insert("email".into(), Value::String(email.clone()));
    }
    if let Some(uri) = &person.uri {
        node.insert("uri".into(), Value::String(uri.clone()));
    }
    Value::Object(node)
}

/// The `Name` of `addr (Name)`, or the whole text.
fn rss_author_name(text: &str) -> String {
    let text = text.trim();
    if let Some(inner) = text.strip_suffix(')') {
        if let Some((_, name)) = inner.rsplit_once('(') {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    text.to_string()
}

fn category_value(category: &Category) -> Value {
    match &category.label {
        Some(label) => json!({ "_": label, "term": category.term }),
        None => Value::String(category.term.clone()),
    }
}

/// Strip HTML tags from text and decode common entities.
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut entity: Option<String> = None;

    for ch in html.chars() {
        if let Some(name) = entity.as_mut() {
            match ch {
                ';' => {
                    push_entity(&mut result, name);
                    entity = None;
                }
                c if c.is_ascii_alphanumeric() || c == '#' => name.push(c),
                c => {
                    // Not an entity after all
                    result.push('&');
                    result.push_str(name);
                    entity = None;
                    match c {
                        '<' => in_tag = true,
                        '&' => entity = Some(String::new()),
                        _ => result.push(c),
                    }
                }
            }
            continue;
        }
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                result.push(' ');
            }
            '&' if !in_tag => entity = Some(String::new()),
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    if let Some(name) = entity {
        result.push('&');
        result.push_str(&name);
    }

    result.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn push_entity(out: &mut String, entity: &str) {
    match entity {
        "amp" => out.push('&'),
        "lt" => out.push('<'),
        "gt" => out.push('>'),
        "quot" => out.push('"'),
        "apos" | "#39" => out.push('\''),
        "nbsp" => out.push(' '),
        _ => match parse_numeric_entity(entity).and_then(char::from_u32) {
            Some(c) => out.push(c),
            None => {
                out.push('&');
                out.push_str(entity);
                out.push(';');
            }
        },
    }
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        entity.strip_prefix('#')?.parse().ok()
    }
}

/// Truncate to at most `max` characters.
fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::normalizer::normalize_item;
    use chrono::{Datelike, TimeZone, Utc};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>A &lt;b&gt;test&lt;/b&gt; feed</description>
    <image><url>https://example.com/logo.png</url><title>Logo</title><link>https://example.com</link></image>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <pubDate>Mon, 21 Oct 2024 07:28:00 GMT</pubDate>
      <author>Jane Doe</author>
      <category>Rust</category>
      <category>Linux</category>
      <description>&lt;p&gt;Short summary&lt;/p&gt;</description>
      <content:encoded><![CDATA[<p>Full <b>body</b></p>]]></content:encoded>
    </item>
    <item>
      <title>No guid</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_validate_url_valid() {
        assert!(validate_url("https://example.com/feed.xml", false).is_ok());
        assert!(validate_url("http://example.com/feed.xml", false).is_ok());
    }

    #[test]
    fn test_validate_url_rejects_malformed() {
        assert!(matches!(
            validate_url("not a url", false),
            Err(NuntiaError::InvalidUrl(_))
        ));
        let err = validate_url("ftp://example.com/feed.xml", false).unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }

    #[test]
    fn test_validate_url_rejects_private_hosts() {
        for url in [
            "http://localhost/feed.xml",
            "http://server.local/feed.xml",
            "http://api.internal/feed.xml",
            "http://127.0.0.1/feed.xml",
            "http://10.0.0.1/feed.xml",
            "http://172.16.0.1/feed.xml",
            "http://192.168.1.1/feed.xml",
            "http://169.254.1.1/feed.xml",
            "http://[::1]/feed.xml",
            "http://[fd00::1]/feed.xml",
        ] {
            assert!(validate_url(url, false).is_err(), "{url} should be rejected");
        }
        assert!(validate_url("http://172.32.0.1/feed.xml", false).is_ok());
    }

    #[test]
    fn test_validate_url_private_hosts_allowed() {
        assert!(validate_url("http://127.0.0.1:8080/feed.xml", true).is_ok());
        assert!(validate_url("http://localhost/feed.xml", true).is_ok());
        // Scheme checks still apply
        assert!(validate_url("file:///etc/passwd", true).is_err());
    }

    #[test]
    fn test_is_forbidden_hostname() {
        assert!(is_forbidden_hostname("localhost"));
        assert!(is_forbidden_hostname("LOCALHOST"));
        assert!(is_forbidden_hostname("printer.lan"));
        assert!(!is_forbidden_hostname("localhost.example.com"));
        assert!(!is_forbidden_hostname("news.ycombinator.com"));
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip(&"100.64.0.1".parse().unwrap()));
        assert!(is_private_ip(&"::ffff:127.0.0.1".parse().unwrap()));
        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn test_parse_feed_rss() {
        let doc = parse_feed(RSS.as_bytes(), 10000).unwrap();
        assert_eq!(doc.title, "Test Feed");
        assert_eq!(doc.description.as_deref(), Some("A test feed"));
        assert!(doc.link.as_deref().unwrap().starts_with("https://example.com"));
        assert_eq!(doc.image.as_deref(), Some("https://example.com/logo.png"));
        assert_eq!(doc.items.len(), 2);

        let first = &doc.items[0];
        assert_eq!(first.guid.as_deref(), Some("guid-1"));
        assert_eq!(first.title, Some(Value::String("First Article".into())));
        assert_eq!(first.link.as_deref(), Some("https://example.com/1"));
        assert_eq!(first.author, Some(Value::String("Jane Doe".into())));
        assert_eq!(first.categories.len(), 2);
        assert!(first.content_encoded.as_deref().unwrap().contains("<b>body</b>"));
        assert_eq!(first.content_snippet.as_deref(), Some("Short summary"));
        assert!(first.iso_date.as_deref().unwrap().starts_with("2024-10-21T07:28:00"));
    }

    #[test]
    fn test_parse_feed_missing_guid_is_none() {
        let doc = parse_feed(RSS.as_bytes(), 10000).unwrap();
        assert!(doc.items[1].guid.is_none());
        assert!(doc.items[1].iso_date.is_none());
    }

    #[test]
    fn test_parse_feed_atom() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:uuid:feed</id>
  <updated>2025-01-02T00:00:00Z</updated>
  <link rel="self" href="https://example.com/atom.xml"/>
  <link rel="alternate" href="https://example.com/"/>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link rel="alternate" href="https://example.com/entry"/>
    <summary>Entry summary</summary>
    <author><name>Author Name</name><email>author@example.com</email></author>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let doc = parse_feed(atom.as_bytes(), 10000).unwrap();
        assert_eq!(doc.title, "Atom Feed");
        assert!(doc.link.as_deref().unwrap().starts_with("https://example.com"));
        assert!(!doc.link.as_deref().unwrap().ends_with("atom.xml"));
        let entry = &doc.items[0];
        assert_eq!(entry.guid.as_deref(), Some("urn:uuid:1"));
        assert_eq!(entry.link.as_deref(), Some("https://example.com/entry"));
        assert_eq!(
            entry.author,
            Some(json!({"name": "Author Name", "email": "author@example.com"}))
        );
        assert!(entry.pub_date.is_some());
    }

    fn rss_item(item: &str) -> String {
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title><item><title>Item</title><guid>g</guid>{item}</item></channel></rss>"#)
    }

    #[test]
    fn test_rss_author_is_stored_as_text() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        for (author, expected) in [
            ("Jane Doe", "Jane Doe"),
            ("jane@example.com (Jane Doe)", "Jane Doe"),
            ("jane@example.com", "jane@example.com"),
        ] {
            let xml = rss_item(&format!("<author>{author}</author>"));
            let doc = parse_feed(xml.as_bytes(), 10000).unwrap();
            assert_eq!(doc.items[0].author, Some(Value::String(expected.into())));

            let story = normalize_item(&doc.items[0], "f", now);
            assert_eq!(story.author.as_deref(), Some(expected), "{author}");
        }
    }

    #[test]
    fn test_rss_author_name() {
        assert_eq!(rss_author_name(" Jane Doe "), "Jane Doe");
        assert_eq!(rss_author_name("jane@example.com (Jane Doe)"), "Jane Doe");
        assert_eq!(rss_author_name("jane@example.com ()"), "jane@example.com ()");
    }

    #[test]
    fn test_out_of_range_year_does_not_panic() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let xml = rss_item("<pubDate>Mon, 01 Jan 10000 00:00:00 GMT</pubDate>");
        let doc = parse_feed(xml.as_bytes(), 10000).unwrap();

        let story = normalize_item(&doc.items[0], "f", now);
        assert!(story.pub_date == now || story.pub_date.year() == 10000);

        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>T</title><id>urn:feed</id><updated>2025-01-01T00:00:00Z</updated>
  <entry><id>urn:1</id><title>E</title><updated>10000-01-01T00:00:00Z</updated></entry>
</feed>"#;
        if let Ok(doc) = parse_feed(atom.as_bytes(), 10000) {
            let story = normalize_item(&doc.items[0], "f", now);
            assert!(story.pub_date == now || story.pub_date.year() == 10000);
        }
    }

    #[test]
    fn test_parse_feed_invalid() {
        assert!(matches!(
            parse_feed(b"This is not XML", 10000),
            Err(NuntiaError::FeedUnparsable(_))
        ));
        assert!(parse_feed(b"<html><body>Hello</body></html>", 10000).is_err());
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(strip_html("<b>Bold</b> text"), "Bold text");
        assert_eq!(strip_html("<p>One</p><p>Two</p>"), "One Two");
        assert_eq!(strip_html("&lt;tag&gt; &amp; &quot;q&quot;"), "<tag> & \"q\"");
        assert_eq!(strip_html("&#65;&#x41;"), "AA");
        assert_eq!(strip_html("Fish & chips"), "Fish & chips");
        assert_eq!(strip_html("<p>\n\tNewlines\n\tand\ttabs\n</p>"), "Newlines and tabs");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("あいうえお", 3), "あいう");
    }

    #[test]
    fn test_fetcher_from_config() {
        let config = FetchConfig {
            total_timeout_secs: 7,
            ..FetchConfig::default()
        };
        let fetcher = FeedFetcher::new(&config).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(7));
        assert!(fetcher.validate("http://127.0.0.1/feed").is_err());
    }
}
