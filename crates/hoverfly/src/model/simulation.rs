//! Serde views of a simulation document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Schema version written on export.
pub const CURRENT_SCHEMA_VERSION: &str = "v5.1";

/// A single matcher entry as declared in a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherView {
    pub matcher: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(
        default,
        rename = "doMatch",
        alias = "doMatching",
        skip_serializing_if = "Option::is_none"
    )]
    pub do_match: Option<Box<MatcherView>>,
}

impl MatcherView {
    pub fn new(matcher: &str, value: impl Into<Value>) -> Self {
        Self {
            matcher: matcher.to_string(),
            value: value.into(),
            config: None,
            do_match: None,
        }
    }

    /// Read a boolean config flag, comparing keys case-insensitively.
    pub fn config_flag(&self, key: &str) -> bool {
        self.config
            .as_ref()
            .and_then(|config| {
                config
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .and_then(|(_, v)| v.as_bool())
            })
            .unwrap_or(false)
    }
}

/// The request half of a pair. An absent field is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMatcherView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<MatcherView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Vec<MatcherView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Vec<MatcherView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Vec<MatcherView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<MatcherView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, Vec<MatcherView>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, Vec<MatcherView>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_state: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_query: Option<Vec<MatcherView>>,
}

/// Log-normal delay parameters, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LogNormalParams {
    pub min: u64,
    pub max: u64,
    pub mean: u64,
    pub median: u64,
}

/// The response half of a pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub encoded_body: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub templated: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transitions_state: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removes_state: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fixed_delay: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_normal_delay: Option<LogNormalParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_serve_action: Option<String>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl ResponseView {
    /// Header values for `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&Vec<String>> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairView {
    #[serde(default)]
    pub request: RequestMatcherView,
    #[serde(default)]
    pub response: ResponseView,
}

/// Fixed delay applied to every response whose URL matches `urlPattern`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayView {
    pub url_pattern: String,
    #[serde(default)]
    pub delay: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogNormalDelayView {
    pub url_pattern: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_method: String,
    #[serde(flatten)]
    pub params: LogNormalParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalActionsView {
    #[serde(default)]
    pub delays: Vec<DelayView>,
    #[serde(default)]
    pub delays_log_normal: Vec<LogNormalDelayView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataView {
    #[serde(default)]
    pub pairs: Vec<PairView>,
    #[serde(default)]
    pub global_actions: GlobalActionsView,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaView {
    pub schema_version: String,
    #[serde(default)]
    pub hoverfly_version: String,
    #[serde(default)]
    pub time_exported: String,
}

impl MetaView {
    /// Metadata stamped on an exported simulation.
    pub fn exported_now() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            hoverfly_version: format!("v{}", env!("CARGO_PKG_VERSION")),
            time_exported: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

/// A complete simulation document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationView {
    pub data: DataView,
    pub meta: MetaView,
}

/// The non-matching pair that came closest to matching a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosestMiss {
    pub request_matcher: RequestMatcherView,
    pub response: ResponseView,
    pub missed_fields: Vec<String>,
    /// State at the time of the miss. Empty on cached entries, which are
    /// filled in with the current state when served.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matcher_view_reads_do_match_aliases() {
        let view: MatcherView = serde_json::from_value(json!({
            "matcher": "jsonpath",
            "value": "$.name",
            "doMatching": {"matcher": "exact", "value": "bob"}
        }))
        .unwrap();
        assert_eq!(view.do_match.unwrap().value, json!("bob"));
    }

    #[test]
    fn test_config_flag_is_case_insensitive() {
        let view: MatcherView = serde_json::from_value(json!({
            "matcher": "array",
            "value": ["a"],
            "config": {"ignoreOrder": true}
        }))
        .unwrap();
        assert!(view.config_flag("ignoreorder"));
        assert!(!view.config_flag("ignoreunknown"));
    }

    #[test]
    fn test_response_view_omits_empty_fields() {
        let response = ResponseView {
            status: 200,
            body: "ok".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"status": 200, "body": "ok", "encodedBody": false, "templated": false})
        );
    }

    #[test]
    fn test_log_normal_delay_view_flattens_params() {
        let view: LogNormalDelayView = serde_json::from_value(json!({
            "urlPattern": ".*",
            "min": 10, "max": 100, "mean": 40, "median": 30
        }))
        .unwrap();
        assert_eq!(view.params.median, 30);
        assert!(view.http_method.is_empty());
    }
}
