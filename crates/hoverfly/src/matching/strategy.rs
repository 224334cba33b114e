//! Pair selection: the `first` and `strongest` strategies.

use super::request::{PairMatch, FIELD_HEADERS, FIELD_STATE};
use crate::model::{ClosestMiss, RequestDetails};
use crate::simulation::SimulationPair;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// How a winner is chosen among matching pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    /// The first matching pair in declaration order.
    First,
    /// The highest scoring matching pair; ties go to the earliest.
    #[default]
    Strongest,
}

impl MatchingStrategy {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "first" => Some(MatchingStrategy::First),
            "strongest" => Some(MatchingStrategy::Strongest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingStrategy::First => "first",
            MatchingStrategy::Strongest => "strongest",
        }
    }
}

impl fmt::Display for MatchingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running a strategy over a simulation.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub pair: Option<Arc<SimulationPair>>,
    /// Only produced by the `strongest` strategy on a miss.
    pub closest_miss: Option<ClosestMiss>,
    /// Whether the outcome depends only on fingerprinted request data.
    pub cachable: bool,
}

/// Select the pair answering `request`.
pub fn select(
    strategy: MatchingStrategy,
    pairs: &[Arc<SimulationPair>],
    request: &RequestDetails,
    webserver: bool,
    state: &HashMap<String, String>,
) -> MatchResult {
    let mut winner: Option<(usize, u32)> = None;
    let mut closest: Option<(usize, PairMatch)> = None;
    let mut cachable = true;

    for (index, pair) in pairs.iter().enumerate() {
        let result = pair.matcher().evaluate(request, webserver, state);
        trace!(
            index,
            matched = result.matched,
            score = result.score,
            missed = ?result.missed_fields,
            "Evaluated pair"
        );

        if result.matched {
            if winner.map_or(true, |(_, best)| result.score > best) {
                winner = Some((index, result.score));
            }
            if strategy == MatchingStrategy::First {
                break;
            }
            continue;
        }

        if missed_only_uncached_fields(&result) {
            cachable = false;
        }
        if closest
            .as_ref()
            .map_or(true, |(_, best)| result.missed_fields.len() < best.missed_fields.len())
        {
            closest = Some((index, result));
        }
    }

    if let Some((index, _)) = winner {
        let pair = Arc::clone(&pairs[index]);
        let matcher = pair.matcher();
        let cachable =
            cachable && matcher.requires_state().is_empty() && !matcher.has_header_matchers();
        return MatchResult {
            pair: Some(pair),
            closest_miss: None,
            cachable,
        };
    }

    let closest_miss = match strategy {
        MatchingStrategy::Strongest => closest.map(|(index, result)| ClosestMiss {
            request_matcher: pairs[index].view().request.clone(),
            response: pairs[index].response().clone(),
            missed_fields: result.missed_fields,
            state: state.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }),
        MatchingStrategy::First => None,
    };

    MatchResult {
        pair: None,
        closest_miss,
        cachable,
    }
}

/// A pair that failed only on headers or state could match a request
/// with the same fingerprint, so the outcome must not be cached.
fn missed_only_uncached_fields(result: &PairMatch) -> bool {
    !result.missed_fields.is_empty()
        && result
            .missed_fields
            .iter()
            .all(|field| field == FIELD_HEADERS || field == FIELD_STATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PairView;
    use proptest::prelude::*;
    use serde_json::json;

    fn pairs(value: serde_json::Value) -> Vec<Arc<SimulationPair>> {
        let views: Vec<PairView> = serde_json::from_value(value).unwrap();
        views
            .into_iter()
            .map(|view| Arc::new(SimulationPair::compile(view)))
            .collect()
    }

    fn request_to(destination: &str) -> RequestDetails {
        RequestDetails {
            path: "/".to_string(),
            method: "GET".to_string(),
            destination: destination.to_string(),
            scheme: "http".to_string(),
            ..Default::default()
        }
    }

    fn body(result: &MatchResult) -> &str {
        &result.pair.as_ref().unwrap().response().body
    }

    fn weak_and_strong() -> Vec<Arc<SimulationPair>> {
        pairs(json!([
            {
                "request": {"destination": [{"matcher": "regex", "value": "destination.com"}]},
                "response": {"status": 200, "body": "first and weakest match"}
            },
            {
                "request": {"destination": [{"matcher": "exact", "value": "destination.com"}]},
                "response": {"status": 200, "body": "second and strongest match"}
            }
        ]))
    }

    #[test]
    fn test_strongest_prefers_exact_over_regex() {
        let result = select(
            MatchingStrategy::Strongest,
            &weak_and_strong(),
            &request_to("destination.com"),
            false,
            &HashMap::new(),
        );
        assert_eq!(body(&result), "second and strongest match");
    }

    #[test]
    fn test_first_uses_declaration_order() {
        let result = select(
            MatchingStrategy::First,
            &weak_and_strong(),
            &request_to("destination.com"),
            false,
            &HashMap::new(),
        );
        assert_eq!(body(&result), "first and weakest match");
    }

    #[test]
    fn test_closest_miss_only_under_strongest() {
        let simulation = pairs(json!([
            {
                "request": {
                    "destination": [{"matcher": "exact", "value": "destination.com"}],
                    "path": [{"matcher": "exact", "value": "/other"}]
                },
                "response": {"status": 200, "body": "two misses"}
            },
            {
                "request": {
                    "destination": [{"matcher": "exact", "value": "destination.com"}],
                    "path": [{"matcher": "exact", "value": "/"}]
                },
                "response": {"status": 200, "body": "one miss"}
            }
        ]));
        let request = request_to("unknown-destination.com");

        let strongest = select(
            MatchingStrategy::Strongest,
            &simulation,
            &request,
            false,
            &HashMap::new(),
        );
        assert!(strongest.pair.is_none());
        let miss = strongest.closest_miss.unwrap();
        assert_eq!(miss.missed_fields, vec!["destination"]);
        assert_eq!(miss.response.body, "one miss");

        let first = select(
            MatchingStrategy::First,
            &simulation,
            &request,
            false,
            &HashMap::new(),
        );
        assert!(first.pair.is_none());
        assert!(first.closest_miss.is_none());
    }

    #[test]
    fn test_state_gated_match_is_not_cachable() {
        let simulation = pairs(json!([
            {
                "request": {
                    "path": [{"matcher": "exact", "value": "/"}],
                    "requiresState": {"logged-in": "true"}
                },
                "response": {"status": 200, "body": "welcome"}
            },
            {
                "request": {"path": [{"matcher": "exact", "value": "/"}]},
                "response": {"status": 401, "body": "login"}
            }
        ]));
        let request = request_to("any.com");

        let anonymous = select(
            MatchingStrategy::Strongest,
            &simulation,
            &request,
            false,
            &HashMap::new(),
        );
        assert_eq!(body(&anonymous), "login");
        assert!(!anonymous.cachable);

        let state: HashMap<_, _> = [("logged-in".to_string(), "true".to_string())].into();
        let logged_in = select(MatchingStrategy::Strongest, &simulation, &request, false, &state);
        assert_eq!(body(&logged_in), "welcome");
        assert!(!logged_in.cachable);
    }

    #[test]
    fn test_plain_match_is_cachable() {
        let result = select(
            MatchingStrategy::Strongest,
            &weak_and_strong(),
            &request_to("destination.com"),
            false,
            &HashMap::new(),
        );
        assert!(result.cachable);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(MatchingStrategy::parse("FIRST"), Some(MatchingStrategy::First));
        assert_eq!(
            MatchingStrategy::parse("strongest"),
            Some(MatchingStrategy::Strongest)
        );
        assert!(MatchingStrategy::parse("best").is_none());
    }

    proptest! {
        #[test]
        fn prop_equal_scores_resolve_to_earliest(copies in 1usize..6, path in "/[a-z]{1,8}") {
            let views: Vec<serde_json::Value> = (0..copies)
                .map(|i| json!({
                    "request": {"path": [{"matcher": "exact", "value": path}]},
                    "response": {"status": 200, "body": i.to_string()}
                }))
                .collect();
            let simulation = pairs(serde_json::Value::Array(views));
            let mut request = request_to("x.com");
            request.path = path.clone();
            let result = select(MatchingStrategy::Strongest, &simulation, &request, false, &HashMap::new());
            prop_assert_eq!(body(&result), "0");
        }

        #[test]
        fn prop_strongest_never_scores_below_first(extra_fields in 0usize..4) {
            let mut strong = serde_json::Map::new();
            strong.insert("path".into(), json!([{"matcher": "glob", "value": "*"}]));
            let fields = [
                ("method", "GET"),
                ("scheme", "http"),
                ("destination", "x.com"),
            ];
            for (name, value) in fields.iter().take(extra_fields) {
                strong.insert((*name).into(), json!([{"matcher": "exact", "value": value}]));
            }
            let simulation = pairs(json!([
                {"request": {"path": [{"matcher": "glob", "value": "*"}]}, "response": {"status": 200, "body": "weak"}},
                {"request": strong, "response": {"status": 200, "body": "strong"}}
            ]));
            let request = request_to("x.com");
            let strongest = select(MatchingStrategy::Strongest, &simulation, &request, false, &HashMap::new());
            let first = select(MatchingStrategy::First, &simulation, &request, false, &HashMap::new());
            prop_assert_eq!(body(&first), "weak");
            let expected = if extra_fields == 0 { "weak" } else { "strong" };
            prop_assert_eq!(body(&strongest), expected);
        }
    }
}
