//! `array` matcher.

use super::matchers::value_as_string;
use crate::model::MatcherView;
use serde_json::Value;
use std::collections::HashMap;

const IGNORE_UNKNOWN: &str = "ignoreunknown";
const IGNORE_ORDER: &str = "ignoreorder";
const IGNORE_OCCURRENCES: &str = "ignoreoccurrences";

/// Compares an actual list against an expected list of values.
///
/// With no config flags the lists must be identical. Each flag relaxes one
/// check: unknown actual values, ordering, or the number of occurrences.
#[derive(Debug, Clone)]
pub struct ArrayMatcher {
    expected: Vec<String>,
    ignore_unknown: bool,
    ignore_order: bool,
    ignore_occurrences: bool,
}

impl ArrayMatcher {
    pub fn from_view(view: &MatcherView) -> Result<Self, String> {
        let expected = match &view.value {
            Value::Array(items) => items.iter().map(value_as_string).collect(),
            other => return Err(format!("expected an array, got {other}")),
        };
        Ok(Self {
            expected,
            ignore_unknown: view.config_flag(IGNORE_UNKNOWN),
            ignore_order: view.config_flag(IGNORE_ORDER),
            ignore_occurrences: view.config_flag(IGNORE_OCCURRENCES),
        })
    }

    /// `actual` is a JSON array, or a `;`-joined list as produced for
    /// multi-valued headers and query parameters.
    pub fn matches(&self, actual: &str) -> bool {
        let actual = split_actual(actual);
        (self.ignore_unknown || self.has_all_known(&actual))
            && (self.ignore_occurrences || self.has_same_occurrences(&actual))
            && (self.ignore_order || self.is_in_same_order(&actual))
    }

    fn has_all_known(&self, actual: &[String]) -> bool {
        actual.iter().all(|value| self.expected.contains(value))
    }

    fn has_same_occurrences(&self, actual: &[String]) -> bool {
        let expected = occurrences(&self.expected);
        let actual = occurrences(actual);
        expected
            .iter()
            .all(|(value, count)| actual.get(value) == Some(count))
    }

    /// Expected values appear in `actual` in the same relative order.
    fn is_in_same_order(&self, actual: &[String]) -> bool {
        let mut index = 0;
        for value in actual {
            if index == self.expected.len() {
                break;
            }
            if *value == self.expected[index] {
                index += 1;
            }
        }
        index == self.expected.len()
    }
}

fn split_actual(actual: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(actual) {
        Ok(Value::Array(items)) => items.iter().map(value_as_string).collect(),
        _ if actual.is_empty() => Vec::new(),
        _ => actual.split(';').map(str::to_string).collect(),
    }
}

fn occurrences(values: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn array(value: Value, config: Value) -> ArrayMatcher {
        let view: MatcherView =
            serde_json::from_value(json!({"matcher": "array", "value": value, "config": config}))
                .unwrap();
        ArrayMatcher::from_view(&view).unwrap()
    }

    #[test]
    fn test_exact_array() {
        let m = array(json!(["a", "b"]), json!({}));
        assert!(m.matches(r#"["a","b"]"#));
        assert!(!m.matches(r#"["b","a"]"#));
        assert!(!m.matches(r#"["a","b","c"]"#));
        assert!(!m.matches(r#"["a"]"#));
    }

    #[test]
    fn test_ignore_order() {
        let m = array(json!(["a", "b"]), json!({"ignoreOrder": true}));
        assert!(m.matches(r#"["b","a"]"#));
        assert!(!m.matches(r#"["b","a","c"]"#));
    }

    #[test]
    fn test_ignore_unknown() {
        let m = array(json!(["a", "b"]), json!({"ignoreUnknown": true}));
        assert!(m.matches(r#"["a","x","b"]"#));
        assert!(!m.matches(r#"["b","x","a"]"#));
    }

    #[test]
    fn test_ignore_occurrences() {
        let m = array(json!(["a", "b"]), json!({"ignoreOccurrences": true}));
        assert!(m.matches(r#"["a","a","b"]"#));
        assert!(!m.matches(r#"["a"]"#));
    }

    #[test]
    fn test_semicolon_joined_values() {
        let m = array(json!(["x", "y"]), json!({"ignoreOrder": true}));
        assert!(m.matches("y;x"));
    }

    #[test]
    fn test_non_string_elements() {
        let m = array(json!([1, true]), json!({}));
        assert!(m.matches("[1, true]"));
    }

    #[test]
    fn test_rejects_non_array_value() {
        let view = MatcherView::new("array", "a");
        assert!(ArrayMatcher::from_view(&view).is_err());
    }
}
