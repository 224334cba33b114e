//! Proxy modes and their arguments.

use crate::matching::MatchingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serve responses from the simulation.
    #[default]
    Simulate,
    /// Forward to the upstream and record pairs.
    Capture,
    /// Forward to the upstream, passing traffic through middleware.
    Modify,
    /// Build responses with middleware only.
    Synthesize,
    /// Serve matches, forward misses to the upstream.
    Spy,
    /// Compare upstream responses with the simulation.
    Diff,
}

impl Mode {
    pub fn parse(name: &str) -> Option<Self> {
        let mode = match name.to_ascii_lowercase().as_str() {
            "simulate" => Mode::Simulate,
            "capture" => Mode::Capture,
            "modify" => Mode::Modify,
            "synthesize" => Mode::Synthesize,
            "spy" => Mode::Spy,
            "diff" => Mode::Diff,
            _ => return None,
        };
        Some(mode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simulate => "simulate",
            Mode::Capture => "capture",
            Mode::Modify => "modify",
            Mode::Synthesize => "synthesize",
            Mode::Spy => "spy",
            Mode::Diff => "diff",
        }
    }

    /// Modes that need a real upstream, unavailable to a webserver.
    fn requires_upstream(&self) -> bool {
        matches!(self, Mode::Capture | Mode::Modify)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    #[error("Not a valid mode")]
    InvalidMode,

    #[error("Only matching strategy of 'first' or 'strongest' is permitted")]
    InvalidMatchingStrategy,

    #[error("Must provide a list containing only an asterix, or a list containing only headers names")]
    InvalidHeadersWhitelist,

    #[error("Cannot change the mode of Hoverfly to {0} when running as a webserver")]
    WebserverModeNotAllowed(Mode),
}

/// Mode arguments as exchanged with the admin API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeArgumentsView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers_whitelist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_strategy: Option<String>,
    #[serde(default)]
    pub stateful: bool,
    #[serde(default)]
    pub overwrite_duplicate: bool,
}

/// Body of `GET`/`PUT /api/v2/hoverfly/mode`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeView {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub arguments: ModeArgumentsView,
}

/// Validated mode settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeSettings {
    pub mode: Mode,
    pub matching_strategy: MatchingStrategy,
    /// Header names recorded in capture mode; `["*"]` records all.
    pub headers_whitelist: Vec<String>,
    pub stateful: bool,
    pub overwrite_duplicate: bool,
}

impl ModeSettings {
    /// Validate a requested mode. A missing matching strategy falls back to
    /// `strongest`.
    pub fn from_view(view: &ModeView, webserver: bool) -> Result<Self, ModeError> {
        let mode = Mode::parse(&view.mode).ok_or(ModeError::InvalidMode)?;
        if webserver && mode.requires_upstream() {
            return Err(ModeError::WebserverModeNotAllowed(mode));
        }

        let matching_strategy = match &view.arguments.matching_strategy {
            Some(name) => {
                MatchingStrategy::parse(name).ok_or(ModeError::InvalidMatchingStrategy)?
            }
            None => MatchingStrategy::default(),
        };

        let headers_whitelist = view.arguments.headers_whitelist.clone().unwrap_or_default();
        if headers_whitelist.len() > 1 && headers_whitelist.iter().any(|h| h == "*") {
            return Err(ModeError::InvalidHeadersWhitelist);
        }

        Ok(Self {
            mode,
            matching_strategy,
            headers_whitelist,
            stateful: view.arguments.stateful,
            overwrite_duplicate: view.arguments.overwrite_duplicate,
        })
    }

    pub fn to_view(&self) -> ModeView {
        ModeView {
            mode: self.mode.to_string(),
            arguments: ModeArgumentsView {
                headers_whitelist: (!self.headers_whitelist.is_empty())
                    .then(|| self.headers_whitelist.clone()),
                matching_strategy: Some(self.matching_strategy.to_string()),
                stateful: self.stateful,
                overwrite_duplicate: self.overwrite_duplicate,
            },
        }
    }

    /// Whether capture should record header `name`.
    pub fn records_header(&self, name: &str) -> bool {
        self.headers_whitelist
            .iter()
            .any(|h| h == "*" || h.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(value: serde_json::Value) -> ModeView {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_modes() {
        for name in ["simulate", "capture", "modify", "synthesize", "spy", "diff"] {
            let settings = ModeSettings::from_view(&view(json!({"mode": name})), false).unwrap();
            assert_eq!(settings.mode.as_str(), name);
            assert_eq!(settings.matching_strategy, MatchingStrategy::Strongest);
        }
    }

    #[test]
    fn test_invalid_mode() {
        let err = ModeSettings::from_view(&view(json!({"mode": "hoverfly"})), false).unwrap_err();
        assert_eq!(err.to_string(), "Not a valid mode");
    }

    #[test]
    fn test_invalid_matching_strategy() {
        let err = ModeSettings::from_view(
            &view(json!({"mode": "simulate", "arguments": {"matchingStrategy": "best"}})),
            false,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only matching strategy of 'first' or 'strongest' is permitted"
        );
    }

    #[test]
    fn test_first_strategy() {
        let settings = ModeSettings::from_view(
            &view(json!({"mode": "simulate", "arguments": {"matchingStrategy": "first"}})),
            false,
        )
        .unwrap();
        assert_eq!(settings.matching_strategy, MatchingStrategy::First);
        assert_eq!(
            settings.to_view().arguments.matching_strategy.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_headers_whitelist() {
        let err = ModeSettings::from_view(
            &view(json!({"mode": "capture", "arguments": {"headersWhitelist": ["*", "Accept"]}})),
            false,
        )
        .unwrap_err();
        assert_eq!(err, ModeError::InvalidHeadersWhitelist);

        let settings = ModeSettings::from_view(
            &view(json!({"mode": "capture", "arguments": {"headersWhitelist": ["Accept"]}})),
            false,
        )
        .unwrap();
        assert!(settings.records_header("accept"));
        assert!(!settings.records_header("Host"));
    }

    #[test]
    fn test_webserver_rejects_upstream_modes() {
        let err = ModeSettings::from_view(&view(json!({"mode": "capture"})), true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot change the mode of Hoverfly to capture when running as a webserver"
        );
        assert!(ModeSettings::from_view(&view(json!({"mode": "spy"})), true).is_ok());
    }
}
