//! Coercion of loosely shaped feed values into plain strings.
//!
//! XML-to-object conversion leaves fields like `author` as either a string or
//! an object holding the text under a conventional key. [`clean_string`]
//! collapses all of those shapes.

use serde_json::Value;

/// Keys that carry the text of a structured node, in priority order.
pub const TEXT_KEYS: &[&str] = &["_", "name", "#text", "text"];

/// Collapse a raw feed value to its best plain-string representation.
///
/// - absent or `null` becomes `""`
/// - a string is returned as is
/// - an object yields the first non-empty string under [`TEXT_KEYS`], else
///   its JSON serialization
/// - an array yields its first element that coerces to a non-empty string,
///   else its JSON serialization (`""` when empty)
/// - numbers and booleans are formatted
pub fn clean_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Object(map)) => TEXT_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .map(|v| clean_string(Some(v)))
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return String::new();
            }
            items
                .iter()
                .map(|v| clean_string(Some(v)))
                .find(|s| !s.is_empty())
                .unwrap_or_else(|| Value::Array(items.clone()).to_string())
        }
    }
}
