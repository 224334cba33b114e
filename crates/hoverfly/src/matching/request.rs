//! Pair matcher: evaluates a whole request matcher against a request.

use super::field_matcher::{FieldMatcher, KeyedFieldMatcher};
use crate::model::{RequestDetails, RequestMatcherView};
use std::collections::{BTreeMap, HashMap};

pub const FIELD_SCHEME: &str = "scheme";
pub const FIELD_METHOD: &str = "method";
pub const FIELD_DESTINATION: &str = "destination";
pub const FIELD_PATH: &str = "path";
pub const FIELD_QUERY: &str = "query";
pub const FIELD_HEADERS: &str = "headers";
pub const FIELD_BODY: &str = "body";
/// Synthetic field reported when `requiresState` is not satisfied.
pub const FIELD_STATE: &str = "state";

/// Result of matching one pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairMatch {
    pub matched: bool,
    /// Sum of field and state scores; meaningful only when matched.
    pub score: u32,
    /// Names of the fields that failed, in evaluation order.
    pub missed_fields: Vec<String>,
}

/// Compiled form of a [`RequestMatcherView`].
#[derive(Debug, Clone)]
pub struct CompiledRequestMatcher {
    scheme: Option<FieldMatcher>,
    method: Option<FieldMatcher>,
    destination: Option<FieldMatcher>,
    path: Option<FieldMatcher>,
    query: Option<KeyedFieldMatcher>,
    deprecated_query: Option<FieldMatcher>,
    headers: Option<KeyedFieldMatcher>,
    body: Option<FieldMatcher>,
    requires_state: BTreeMap<String, String>,
}

impl CompiledRequestMatcher {
    pub fn compile(view: &RequestMatcherView) -> Self {
        let field = |views: &Option<Vec<_>>| views.as_deref().map(FieldMatcher::compile);
        Self {
            scheme: field(&view.scheme),
            method: field(&view.method),
            destination: field(&view.destination),
            path: field(&view.path),
            query: view.query.as_ref().map(|q| KeyedFieldMatcher::compile(q, false)),
            deprecated_query: field(&view.deprecated_query),
            headers: view.headers.as_ref().map(|h| KeyedFieldMatcher::compile(h, true)),
            body: field(&view.body),
            requires_state: view.requires_state.clone().unwrap_or_default(),
        }
    }

    pub fn requires_state(&self) -> &BTreeMap<String, String> {
        &self.requires_state
    }

    /// Whether this matcher constrains any header.
    pub fn has_header_matchers(&self) -> bool {
        self.headers.as_ref().is_some_and(|h| !h.is_empty())
    }

    /// Match `request` against every declared field and the state
    /// preconditions. The destination is ignored in webserver mode.
    pub fn evaluate(
        &self,
        request: &RequestDetails,
        webserver: bool,
        state: &HashMap<String, String>,
    ) -> PairMatch {
        let mut result = PairMatch::default();
        let mut record = |name: &str, score: Option<u32>| match score {
            Some(points) => result.score += points,
            None => result.missed_fields.push(name.to_string()),
        };

        if let Some(field) = &self.scheme {
            record(FIELD_SCHEME, field.evaluate(&request.scheme));
        }
        if let Some(field) = &self.method {
            record(FIELD_METHOD, field.evaluate(&request.method));
        }
        if !webserver {
            if let Some(field) = &self.destination {
                record(FIELD_DESTINATION, field.evaluate(&request.destination));
            }
        }
        if let Some(field) = &self.path {
            record(FIELD_PATH, field.evaluate(&request.path));
        }

        let query = match (&self.query, &self.deprecated_query) {
            (None, None) => None,
            (keyed, deprecated) => {
                let keyed_score = keyed.as_ref().map_or(Some(0), |q| q.evaluate(&request.query));
                let deprecated_score = deprecated
                    .as_ref()
                    .map_or(Some(0), |q| q.evaluate(&request.query_string()));
                Some(keyed_score.zip(deprecated_score).map(|(a, b)| a + b))
            }
        };
        if let Some(score) = query {
            record(FIELD_QUERY, score);
        }

        if let Some(headers) = &self.headers {
            record(FIELD_HEADERS, headers.evaluate(&request.headers));
        }
        if let Some(field) = &self.body {
            record(FIELD_BODY, field.evaluate(&request.body));
        }

        if !self.requires_state.is_empty() {
            let satisfied = self
                .requires_state
                .iter()
                .all(|(key, value)| state.get(key) == Some(value));
            record(
                FIELD_STATE,
                satisfied.then_some(self.requires_state.len() as u32),
            );
        }

        result.matched = result.missed_fields.is_empty();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matcher(value: serde_json::Value) -> CompiledRequestMatcher {
        let view: RequestMatcherView = serde_json::from_value(value).unwrap();
        CompiledRequestMatcher::compile(&view)
    }

    fn request() -> RequestDetails {
        RequestDetails {
            path: "/api/orders".to_string(),
            method: "POST".to_string(),
            destination: "shop.com".to_string(),
            scheme: "https".to_string(),
            query: RequestDetails::parse_query("page=2&sort=asc"),
            body: r#"{"item": "book"}"#.to_string(),
            headers: [("Content-Type".to_string(), vec!["application/json".to_string()])]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_empty_matcher_matches_everything() {
        let result = matcher(json!({})).evaluate(&request(), false, &HashMap::new());
        assert!(result.matched);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_all_fields_must_match() {
        let m = matcher(json!({
            "scheme": [{"matcher": "exact", "value": "https"}],
            "method": [{"matcher": "exact", "value": "POST"}],
            "destination": [{"matcher": "glob", "value": "*.com"}],
            "path": [{"matcher": "exact", "value": "/api/orders"}],
            "query": {"page": [{"matcher": "exact", "value": "2"}]},
            "headers": {"content-type": [{"matcher": "glob", "value": "*json"}]},
            "body": [{"matcher": "jsonpartial", "value": {"item": "book"}}]
        }));
        let result = m.evaluate(&request(), false, &HashMap::new());
        assert!(result.matched, "{:?}", result.missed_fields);
    }

    #[test]
    fn test_reports_every_missed_field() {
        let m = matcher(json!({
            "method": [{"matcher": "exact", "value": "GET"}],
            "path": [{"matcher": "exact", "value": "/api/orders"}],
            "body": [{"matcher": "exact", "value": "nope"}]
        }));
        let result = m.evaluate(&request(), false, &HashMap::new());
        assert!(!result.matched);
        assert_eq!(result.missed_fields, vec!["method", "body"]);
    }

    #[test]
    fn test_destination_ignored_in_webserver_mode() {
        let m = matcher(json!({"destination": [{"matcher": "exact", "value": "other.com"}]}));
        assert!(!m.evaluate(&request(), false, &HashMap::new()).matched);
        assert!(m.evaluate(&request(), true, &HashMap::new()).matched);
    }

    #[test]
    fn test_deprecated_query_matches_canonical_string() {
        let m = matcher(json!({
            "deprecatedQuery": [{"matcher": "exact", "value": "page=2&sort=asc"}]
        }));
        assert!(m.evaluate(&request(), false, &HashMap::new()).matched);

        let mut reordered = request();
        reordered.query = RequestDetails::parse_query("sort=asc&page=2");
        assert!(m.evaluate(&reordered, false, &HashMap::new()).matched);
    }

    #[test]
    fn test_requires_state() {
        let m = matcher(json!({
            "path": [{"matcher": "exact", "value": "/api/orders"}],
            "requiresState": {"basket": "full"}
        }));
        let result = m.evaluate(&request(), false, &HashMap::new());
        assert_eq!(result.missed_fields, vec!["state"]);

        let wrong: HashMap<_, _> = [("basket".to_string(), "empty".to_string())].into();
        assert!(!m.evaluate(&request(), false, &wrong).matched);

        let right: HashMap<_, _> = [("basket".to_string(), "full".to_string())].into();
        let result = m.evaluate(&request(), false, &right);
        assert!(result.matched);
        assert_eq!(result.score, 3);
    }
}
