//! Reading simulation documents.
//!
//! Handles schema detection, upgrading `v3`/`v4` documents to the current
//! shape, and the non-fatal checks that produce import warnings.

use super::{ResponseDelays, SimulationError, SimulationPair};
use crate::matching::matchers::value_as_string;
use crate::model::{
    DataView, GlobalActionsView, MatcherView, MetaView, PairView, RequestMatcherView, ResponseView,
    SimulationView,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const DEPRECATED_QUERY_DOCS: &str = "https://hoverfly.readthedocs.io/en/latest/pages/troubleshooting/troubleshooting.html#why-does-my-simulation-have-a-deprecatedquery-field";

/// Prefix of state keys that drive ordered scenarios.
pub const SEQUENCE_PREFIX: &str = "sequence:";

/// A non-fatal problem found while importing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl ImportWarning {
    fn new(message: String) -> Self {
        Self {
            message: format!("WARNING: {message}"),
            documentation: None,
        }
    }

    fn documented(message: String, documentation: &str) -> Self {
        Self {
            documentation: Some(documentation.to_string()),
            ..Self::new(message)
        }
    }

    pub(crate) fn duplicate_pair(index: usize) -> Self {
        Self::new(format!(
            "data.pairs[{index}] is not added due to a conflict with the existing simulation"
        ))
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub warnings: Vec<ImportWarning>,
}

/// A validated simulation ready to be stored.
#[derive(Debug)]
pub struct PreparedSimulation {
    pub pairs: Vec<SimulationPair>,
    pub global_actions: GlobalActionsView,
    pub delays: ResponseDelays,
    pub warnings: Vec<ImportWarning>,
}

/// Parse a simulation document of any supported schema version into the
/// current shape.
pub fn parse_simulation(body: &[u8]) -> Result<SimulationView, SimulationError> {
    let document: Value = serde_json::from_slice(body).map_err(|_| SimulationError::InvalidJson)?;
    let meta = document
        .get("meta")
        .filter(|meta| meta.is_object())
        .ok_or(SimulationError::MissingMeta)?;
    let version = meta
        .get("schemaVersion")
        .and_then(Value::as_str)
        .ok_or(SimulationError::MissingSchemaVersion)?
        .to_string();

    let invalid = |e: serde_json::Error| SimulationError::InvalidSimulation {
        version: version.clone(),
        reason: e.to_string(),
    };

    match version.as_str() {
        "v5" | "v5.1" => serde_json::from_value(document).map_err(invalid),
        "v3" | "v4" => {
            let legacy: LegacySimulation = serde_json::from_value(document).map_err(invalid)?;
            debug!(version = %version, "Upgrading legacy simulation");
            Ok(legacy.upgrade())
        }
        _ => Err(SimulationError::UnsupportedSchemaVersion(version.clone())),
    }
}

/// Compile and check a parsed simulation.
pub fn prepare(view: SimulationView) -> Result<PreparedSimulation, SimulationError> {
    let delays = ResponseDelays::compile(&view.data.global_actions)?;
    let mut warnings = Vec::new();

    for (index, pair) in view.data.pairs.iter().enumerate() {
        if let Some(params) = &pair.response.log_normal_delay {
            params.validate()?;
        }
        if pair.request.deprecated_query.is_some() {
            warnings.push(ImportWarning::documented(
                format!("Usage of deprecated field `deprecatedQuery` on data.pairs[{index}].request.deprecatedQuery, please update your simulation to use `query` field"),
                DEPRECATED_QUERY_DOCS,
            ));
        }
        warnings.extend(check_content_length(index, &pair.response));
    }

    for warning in &warnings {
        warn!("{}", warning.message);
    }

    Ok(PreparedSimulation {
        pairs: view
            .data
            .pairs
            .into_iter()
            .map(SimulationPair::compile)
            .collect(),
        global_actions: view.data.global_actions,
        delays,
        warnings,
    })
}

fn check_content_length(index: usize, response: &ResponseView) -> Option<ImportWarning> {
    let content_length = response.header("Content-Length")?;
    if response.header("Transfer-Encoding").is_some() {
        return Some(ImportWarning::new(format!(
            "Response contains both Content-Length and Transfer-Encoding headers on data.pairs[{index}].response, please remove one of these headers"
        )));
    }
    let body_length = if response.encoded_body {
        STANDARD
            .decode(&response.body)
            .map(|b| b.len())
            .unwrap_or(response.body.len())
    } else {
        response.body.len()
    };
    let declared = content_length.first().and_then(|v| v.trim().parse::<usize>().ok());
    (declared != Some(body_length)).then(|| {
        ImportWarning::new(format!(
            "Response contains incorrect Content-Length header on data.pairs[{index}].response, please correct or remove header"
        ))
    })
}

/// `sequence:*` keys required by any of `pairs`.
pub fn sequence_keys<'a>(pairs: impl IntoIterator<Item = &'a PairView>) -> BTreeSet<String> {
    pairs
        .into_iter()
        .filter_map(|pair| pair.request.requires_state.as_ref())
        .flat_map(|state| state.keys())
        .filter(|key| key.starts_with(SEQUENCE_PREFIX))
        .cloned()
        .collect()
}

/// `v3`/`v4` single-valued field matchers.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyFieldMatchers {
    exact_match: Option<Value>,
    glob_match: Option<Value>,
    json_match: Option<Value>,
    json_path_match: Option<Value>,
    regex_match: Option<Value>,
    xml_match: Option<Value>,
    xpath_match: Option<Value>,
}

impl LegacyFieldMatchers {
    fn upgrade(&self) -> Vec<MatcherView> {
        [
            ("exact", &self.exact_match),
            ("glob", &self.glob_match),
            ("json", &self.json_match),
            ("jsonpath", &self.json_path_match),
            ("regex", &self.regex_match),
            ("xml", &self.xml_match),
            ("xpath", &self.xpath_match),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.as_ref().map(|v| MatcherView::new(kind, v.clone())))
        .collect()
    }

    /// Query matchers compare against the unescaped query string.
    fn upgrade_query(&self) -> Vec<MatcherView> {
        [("exact", &self.exact_match), ("glob", &self.glob_match)]
            .into_iter()
            .filter_map(|(kind, value)| {
                value.as_ref().map(|v| {
                    let raw = value_as_string(v);
                    let unescaped = urlencoding::decode(&raw)
                        .map(|s| s.into_owned())
                        .unwrap_or(raw);
                    MatcherView::new(kind, unescaped)
                })
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRequestMatcher {
    path: Option<LegacyFieldMatchers>,
    method: Option<LegacyFieldMatchers>,
    destination: Option<LegacyFieldMatchers>,
    scheme: Option<LegacyFieldMatchers>,
    query: Option<LegacyFieldMatchers>,
    body: Option<LegacyFieldMatchers>,
    headers: Option<BTreeMap<String, Vec<String>>>,
    headers_with_matchers: Option<BTreeMap<String, LegacyFieldMatchers>>,
    queries_with_matchers: Option<BTreeMap<String, LegacyFieldMatchers>>,
    requires_state: Option<BTreeMap<String, String>>,
}

impl LegacyRequestMatcher {
    fn upgrade(self) -> RequestMatcherView {
        let field = |m: &Option<LegacyFieldMatchers>| m.as_ref().map(LegacyFieldMatchers::upgrade);

        let mut headers: BTreeMap<String, Vec<MatcherView>> = BTreeMap::new();
        for (name, values) in self.headers.unwrap_or_default() {
            headers
                .entry(name)
                .or_default()
                .push(MatcherView::new("exact", values.join(";")));
        }
        for (name, matchers) in self.headers_with_matchers.unwrap_or_default() {
            headers.entry(name).or_default().extend(matchers.upgrade());
        }

        let query: BTreeMap<String, Vec<MatcherView>> = self
            .queries_with_matchers
            .unwrap_or_default()
            .into_iter()
            .map(|(key, matchers)| (key, matchers.upgrade()))
            .collect();

        RequestMatcherView {
            path: field(&self.path),
            method: field(&self.method),
            destination: field(&self.destination),
            scheme: field(&self.scheme),
            body: field(&self.body),
            headers: (!headers.is_empty()).then_some(headers),
            query: (!query.is_empty()).then_some(query),
            requires_state: self.requires_state,
            deprecated_query: self.query.as_ref().map(LegacyFieldMatchers::upgrade_query),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LegacyPair {
    #[serde(default)]
    request: LegacyRequestMatcher,
    #[serde(default)]
    response: ResponseView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyData {
    #[serde(default)]
    pairs: Vec<LegacyPair>,
    #[serde(default)]
    global_actions: GlobalActionsView,
}

#[derive(Debug, Deserialize)]
struct LegacySimulation {
    data: LegacyData,
    meta: MetaView,
}

impl LegacySimulation {
    fn upgrade(self) -> SimulationView {
        SimulationView {
            data: DataView {
                pairs: self
                    .data
                    .pairs
                    .into_iter()
                    .map(|pair| PairView {
                        request: pair.request.upgrade(),
                        response: pair.response,
                    })
                    .collect(),
                global_actions: self.data.global_actions,
            },
            meta: MetaView {
                schema_version: "v5".to_string(),
                ..self.meta
            },
        }
    }
}
