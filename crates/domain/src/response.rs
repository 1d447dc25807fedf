//! Platform response union and id normalizer.
//!
//! The platform answers with JSON objects of varying shape, bare quoted
//! strings, or nothing useful at all. Responses are modeled as an explicit
//! union and the id extraction as a total function over it; `None` from
//! [`extract_id`] is a hard failure for any caller that needed an id.

use serde_json::Value;

/// Canonical shape of a successful platform reply.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformResponse {
    /// Body was not JSON; raw text with quotes/whitespace trimmed.
    Text(String),
    /// Parsed JSON body (objects, arrays, bare strings, booleans).
    Json(Value),
    /// Empty body.
    Empty,
}

impl PlatformResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            PlatformResponse::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Identifier keys probed in priority order.
const ID_KEYS: [&str; 7] = [
    "projectId",
    "applicationId",
    "appId",
    "id",
    "_id",
    "project_id",
    "application_id",
];

/// Extract the canonical identifier from a platform reply.
///
/// Strings are trimmed of quotes and whitespace. Objects are probed with
/// the priority key list, then one level into a nested `data` object, then fall
/// back to the first string field that has no whitespace and at least six
/// characters.
pub fn extract_id(response: &PlatformResponse) -> Option<String> {
    match response {
        PlatformResponse::Text(text) => clean_id(text),
        PlatformResponse::Json(value) => extract_from_value(value),
        PlatformResponse::Empty => None,
    }
}

fn extract_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_id(s),
        Value::Object(map) => {
            for key in ID_KEYS {
                if let Some(Value::String(s)) = map.get(key) {
                    if let Some(id) = clean_id(s) {
                        return Some(id);
                    }
                }
            }
            if let Some(Value::Object(data)) = map.get("data") {
                for key in ID_KEYS {
                    if let Some(Value::String(s)) = data.get(key) {
                        if let Some(id) = clean_id(s) {
                            return Some(id);
                        }
                    }
                }
            }
            map.values().find_map(|v| match v {
                Value::String(s) if !s.contains(char::is_whitespace) && s.len() >= 6 => {
                    clean_id(s)
                }
                _ => None,
            })
        }
        _ => None,
    }
}

fn clean_id(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
