//! Keyword-based topic inference for stories without categories.

use crate::feed::fetcher::strip_html;
use crate::feed::types::{encode_categories, NormalizedStory};

/// Maximum number of topics assigned to one story.
pub const MAX_TOPICS: usize = 3;

/// Topic labels and the keywords that select them, in priority order.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "AI",
        &[
            "ai",
            "artificial intelligence",
            "machine learning",
            "deep learning",
            "llm",
            "gpt",
            "neural",
            "chatgpt",
            "openai",
            "anthropic",
            "claude",
            "gemini",
            "llama",
        ],
    ),
    (
        "Tech",
        &[
            "software",
            "hardware",
            "startup",
            "tech",
            "developer",
            "programming",
            "code",
            "app",
            "open source",
            "github",
            "gitlab",
            "framework",
            "library",
            "api",
        ],
    ),
    (
        "OS",
        &[
            "windows", "linux", "macos", "ios", "android", "ubuntu", "debian", "arch", "fedora",
            "microsoft", "apple",
        ],
    ),
    (
        "Web",
        &[
            "browser",
            "chrome",
            "firefox",
            "safari",
            "edge",
            "css",
            "html",
            "javascript",
            "typescript",
            "react",
            "next.js",
            "node",
            "web",
        ],
    ),
    (
        "Security",
        &[
            "security",
            "hack",
            "vulnerability",
            "breach",
            "cyber",
            "malware",
            "privacy",
            "ransomware",
            "phishing",
            "auth",
            "cve",
        ],
    ),
    (
        "Business",
        &[
            "funding",
            "investment",
            "ipo",
            "acquisition",
            "revenue",
            "market",
            "stock",
            "economy",
            "finance",
            "venture",
            "capital",
        ],
    ),
    (
        "Science",
        &[
            "research",
            "study",
            "discovery",
            "scientists",
            "experiment",
            "physics",
            "biology",
            "chemistry",
            "space",
            "nasa",
            "astronomy",
        ],
    ),
    (
        "Energy",
        &[
            "energy", "battery", "solar", "wind", "nuclear", "climate", "electric", "ev", "tesla",
            "power", "grid",
        ],
    ),
    (
        "Design",
        &[
            "design",
            "ui",
            "ux",
            "interface",
            "css",
            "figma",
            "typography",
            "logo",
            "brand",
        ],
    ),
    (
        "Hardware",
        &[
            "cpu",
            "gpu",
            "ram",
            "intel",
            "amd",
            "nvidia",
            "arm",
            "chip",
            "processor",
            "device",
            "phone",
            "laptop",
            "desktop",
            "screen",
        ],
    ),
    (
        "Gaming",
        &[
            "game",
            "gaming",
            "playstation",
            "xbox",
            "nintendo",
            "steam",
            "valve",
            "esports",
            "twitch",
        ],
    ),
    (
        "Crypto",
        &[
            "crypto",
            "bitcoin",
            "blockchain",
            "ethereum",
            "web3",
            "nft",
            "wallet",
            "coin",
            "token",
        ],
    ),
    (
        "Social",
        &[
            "social",
            "meta",
            "facebook",
            "twitter",
            "x.com",
            "instagram",
            "tiktok",
            "linkedin",
            "reddit",
            "bluesky",
            "threads",
        ],
    ),
];

/// Detect up to [`MAX_TOPICS`] topics from a title and HTML content.
///
/// Matching is a case-insensitive substring search, so short keywords such
/// as "ai" also hit inside longer words.
pub fn detect_topics(title: &str, content: &str) -> Vec<String> {
    let text = format!("{} {}", title, strip_html(content)).to_lowercase();

    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(topic, _)| topic.to_string())
        .take(MAX_TOPICS)
        .collect()
}

/// Fill `categories` with inferred topics on stories that have none.
pub fn infer_missing_topics(stories: &mut [NormalizedStory]) {
    for story in stories.iter_mut().filter(|s| s.categories.is_none()) {
        let topics = detect_topics(&story.title, story.content.as_deref().unwrap_or(""));
        story.categories = encode_categories(&topics);
    }
}
