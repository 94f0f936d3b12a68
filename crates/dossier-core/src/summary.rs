//! Summaries of JSON payloads for logs, execution records and audit trails.
//!
//! Two views are provided:
//!
//! - [`summarize`]: compact JSON clipped to a byte budget (UTF-8 safe).
//! - [`redact`]: a structural copy where every leaf is replaced by a type
//!   hint (and length for strings/arrays). Object keys are kept so a remote
//!   reader can still see *which* fields were sent, never their content.

use serde_json::{Map, Value, json};

/// Default budget for summaries stored in step results and audit records.
pub const DEFAULT_SUMMARY_BYTES: usize = 240;

const ELLIPSIS: &str = "...";

/// Clip `s` to at most `max_bytes`, appending `...` when clipped.
///
/// Never splits a multi-byte character.
pub fn clip(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let mut end = max_bytes.saturating_sub(ELLIPSIS.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{ELLIPSIS}", &s[..end])
}

/// Compact JSON rendering of `value`, clipped to `max_bytes`.
pub fn summarize(value: &Value, max_bytes: usize) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    clip(&rendered, max_bytes)
}

/// JSON type name of `value`.
pub fn type_hint(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Metadata-only copy of `value`.
///
/// - strings → `{"type": "string", "length": <chars>}`
/// - arrays → `{"type": "array", "length": <items>}`
/// - objects → same keys, each value redacted recursively
/// - other leaves → `{"type": <hint>}`
pub fn redact(value: &Value) -> Value {
    match value {
        Value::String(s) => json!({ "type": "string", "length": s.chars().count() }),
        Value::Array(items) => json!({ "type": "array", "length": items.len() }),
        Value::Object(map) => {
            let redacted: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), redact(v)))
                .collect();
            Value::Object(redacted)
        }
        other => json!({ "type": type_hint(other) }),
    }
}

/// Returns `true` if no string content survives in `value`.
///
/// Used by tests and by the remote transport as a last check before sending.
pub fn is_metadata_only(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            let is_leaf_hint = map.get("type").is_some_and(Value::is_string)
                && map.keys().all(|k| k == "type" || k == "length");
            is_leaf_hint || map.values().all(is_metadata_only)
        }
        _ => false,
    }
}
