//! JSON-based matchers: `json`, `jsonpartial`, `jsonpath` and `jwt`.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{json, Value};
use serde_json_path::JsonPath;

/// Expected JSON for a matcher: a string value holds JSON text, any other
/// value is the document itself.
pub fn expected_json(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(text) => serde_json::from_str(text).map_err(|e| e.to_string()),
        other => Ok(other.clone()),
    }
}

/// Structural equality of `actual` (as JSON text) with `expected`.
pub fn equals(expected: &Value, actual: &str) -> bool {
    serde_json::from_str::<Value>(actual).is_ok_and(|actual| actual == *expected)
}

/// Whether `expected` is contained in `actual` at the root or at any
/// nested position.
pub fn partial(expected: &Value, actual: &str) -> bool {
    serde_json::from_str::<Value>(actual).is_ok_and(|actual| contains_anywhere(&actual, expected))
}

fn contains_anywhere(actual: &Value, expected: &Value) -> bool {
    if is_subset(actual, expected) {
        return true;
    }
    match actual {
        Value::Object(map) => map.values().any(|v| contains_anywhere(v, expected)),
        Value::Array(items) => items.iter().any(|v| contains_anywhere(v, expected)),
        _ => false,
    }
}

fn is_subset(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| is_subset(a, value))),
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|value| actual.iter().any(|a| is_subset(a, value))),
        (actual, expected) => actual == expected,
    }
}

/// Parse a JSONPath expression, accepting the `{$.path}` and `.path`
/// spellings found in older simulations.
pub fn parse_json_path(expression: &str) -> Result<JsonPath, String> {
    let trimmed = expression.trim();
    let unwrapped = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed)
        .trim();
    let normalized = if unwrapped.starts_with('$') {
        unwrapped.to_string()
    } else if unwrapped.starts_with('.') || unwrapped.starts_with('[') {
        format!("${unwrapped}")
    } else {
        format!("$.{unwrapped}")
    };
    JsonPath::parse(&normalized).map_err(|e| e.to_string())
}

/// Run a JSONPath query over `actual`.
///
/// Returns `None` when the body is not JSON or nothing was selected. A
/// single string result is returned as-is; anything else as JSON text.
pub fn query(path: &JsonPath, actual: &str) -> Option<String> {
    let document: Value = serde_json::from_str(actual).ok()?;
    let nodes = path.query(&document).all();
    match nodes.as_slice() {
        [] => None,
        [Value::String(s)] => Some(s.clone()),
        [single] => Some(single.to_string()),
        many => Some(Value::Array(many.iter().map(|v| (*v).clone()).collect()).to_string()),
    }
}

/// Decode a JWT (optionally prefixed with `Bearer `) and check that
/// `expected` is contained in `{"header": ..., "payload": ...}`.
pub fn jwt(expected: &Value, actual: &str) -> bool {
    decode_jwt(actual).is_some_and(|token| is_subset(&token, expected))
}

fn decode_jwt(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    let token = match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim(),
        _ => trimmed,
    };
    let mut segments = token.split('.');
    let header = decode_segment(segments.next()?)?;
    let payload = decode_segment(segments.next()?)?;
    Some(json!({"header": header, "payload": payload}))
}

fn decode_segment(segment: &str) -> Option<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| URL_SAFE.decode(segment))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}
