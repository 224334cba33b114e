//! Matcher registry.
//!
//! Every matcher kind is a variant of [`MatcherRule`], compiled once from a
//! [`MatcherView`] when a simulation is loaded and evaluated through
//! [`CompiledMatcher::evaluate`]. Evaluation never fails: unparsable input
//! is a non-match.

use super::array::ArrayMatcher;
use super::field_matcher::KeyedFieldMatcher;
use super::{json, xml};
use crate::model::{MatcherView, RequestDetails};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Registered matcher kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherKind {
    Exact,
    Glob,
    Regex,
    Json,
    JsonPartial,
    JsonPath,
    Xml,
    XmlPartial,
    Xpath,
    Jwt,
    Form,
    Array,
    Negate,
}

impl MatcherKind {
    /// Resolve a declared matcher name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "exact" => MatcherKind::Exact,
            "glob" => MatcherKind::Glob,
            "regex" => MatcherKind::Regex,
            "json" => MatcherKind::Json,
            "jsonpartial" => MatcherKind::JsonPartial,
            "jsonpath" => MatcherKind::JsonPath,
            "xml" => MatcherKind::Xml,
            "xmlpartial" => MatcherKind::XmlPartial,
            "xpath" => MatcherKind::Xpath,
            "jwt" => MatcherKind::Jwt,
            "form" => MatcherKind::Form,
            "array" => MatcherKind::Array,
            "negate" => MatcherKind::Negate,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Exact => "exact",
            MatcherKind::Glob => "glob",
            MatcherKind::Regex => "regex",
            MatcherKind::Json => "json",
            MatcherKind::JsonPartial => "jsonpartial",
            MatcherKind::JsonPath => "jsonpath",
            MatcherKind::Xml => "xml",
            MatcherKind::XmlPartial => "xmlpartial",
            MatcherKind::Xpath => "xpath",
            MatcherKind::Jwt => "jwt",
            MatcherKind::Form => "form",
            MatcherKind::Array => "array",
            MatcherKind::Negate => "negate",
        }
    }
}

/// Reasons a declared matcher cannot be compiled.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("unknown matcher '{0}'")]
    UnknownKind(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("invalid value for {kind} matcher: {reason}")]
    InvalidValue { kind: &'static str, reason: String },
}

impl MatcherError {
    fn invalid(kind: MatcherKind, reason: impl Into<String>) -> Self {
        MatcherError::InvalidValue {
            kind: kind.as_str(),
            reason: reason.into(),
        }
    }
}

/// Runtime form of each matcher kind.
#[derive(Debug, Clone)]
enum MatcherRule {
    Exact(String),
    Glob(Arc<Regex>),
    Regex(Arc<Regex>),
    Json(Value),
    JsonPartial(Value),
    JsonPath(serde_json_path::JsonPath),
    Xml(String),
    XmlPartial(String),
    Xpath(String),
    Jwt(Value),
    Form(KeyedFieldMatcher),
    Array(ArrayMatcher),
    Negate(Box<CompiledMatcher>),
    /// A declaration that could not be compiled; never matches.
    Invalid,
}

/// A compiled matcher entry with its optional `doMatch` chain.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    kind: Option<MatcherKind>,
    rule: MatcherRule,
    chain: Option<Box<CompiledMatcher>>,
}

impl CompiledMatcher {
    /// Compile a declared matcher.
    pub fn compile(view: &MatcherView) -> Result<Self, MatcherError> {
        let kind = MatcherKind::parse(&view.matcher)
            .ok_or_else(|| MatcherError::UnknownKind(view.matcher.clone()))?;

        let rule = match kind {
            MatcherKind::Exact => MatcherRule::Exact(value_as_string(&view.value)),
            MatcherKind::Glob => {
                MatcherRule::Glob(Arc::new(glob_to_regex(&value_as_string(&view.value))?))
            }
            MatcherKind::Regex => {
                MatcherRule::Regex(Arc::new(Regex::new(&value_as_string(&view.value))?))
            }
            MatcherKind::Json => MatcherRule::Json(
                json::expected_json(&view.value).map_err(|e| MatcherError::invalid(kind, e))?,
            ),
            MatcherKind::JsonPartial => MatcherRule::JsonPartial(
                json::expected_json(&view.value).map_err(|e| MatcherError::invalid(kind, e))?,
            ),
            MatcherKind::JsonPath => MatcherRule::JsonPath(
                json::parse_json_path(&value_as_string(&view.value))
                    .map_err(|e| MatcherError::invalid(kind, e))?,
            ),
            MatcherKind::Xml => MatcherRule::Xml(
                xml::canonical(&value_as_string(&view.value))
                    .ok_or_else(|| MatcherError::invalid(kind, "value is not a valid XML document"))?,
            ),
            MatcherKind::XmlPartial => {
                let expected = value_as_string(&view.value);
                if xml::canonical(&expected).is_none() {
                    return Err(MatcherError::invalid(kind, "value is not a valid XML document"));
                }
                MatcherRule::XmlPartial(expected)
            }
            MatcherKind::Xpath => MatcherRule::Xpath(value_as_string(&view.value)),
            MatcherKind::Jwt => MatcherRule::Jwt(
                json::expected_json(&view.value).map_err(|e| MatcherError::invalid(kind, e))?,
            ),
            MatcherKind::Form => {
                let fields: BTreeMap<String, Vec<MatcherView>> =
                    serde_json::from_value(view.value.clone())
                        .map_err(|e| MatcherError::invalid(kind, e.to_string()))?;
                MatcherRule::Form(KeyedFieldMatcher::compile(&fields, false))
            }
            MatcherKind::Array => MatcherRule::Array(
                ArrayMatcher::from_view(view).map_err(|e| MatcherError::invalid(kind, e))?,
            ),
            MatcherKind::Negate => {
                let inner = match &view.value {
                    Value::Object(_) => {
                        let nested: MatcherView = serde_json::from_value(view.value.clone())
                            .map_err(|e| MatcherError::invalid(kind, e.to_string()))?;
                        CompiledMatcher::compile(&nested)?
                    }
                    other => CompiledMatcher::exact(&value_as_string(other)),
                };
                MatcherRule::Negate(Box::new(inner))
            }
        };

        let chain = match &view.do_match {
            Some(next) => Some(Box::new(CompiledMatcher::compile(next)?)),
            None => None,
        };

        Ok(Self {
            kind: Some(kind),
            rule,
            chain,
        })
    }

    /// Compile a declared matcher, turning compile failures into an entry
    /// that never matches.
    pub fn compile_or_fail_closed(view: &MatcherView) -> Self {
        Self::compile(view).unwrap_or_else(|e| {
            warn!(matcher = %view.matcher, "Matcher will never match: {}", e);
            Self {
                kind: MatcherKind::parse(&view.matcher),
                rule: MatcherRule::Invalid,
                chain: None,
            }
        })
    }

    /// An `exact` matcher for `value`.
    pub fn exact(value: &str) -> Self {
        Self {
            kind: Some(MatcherKind::Exact),
            rule: MatcherRule::Exact(value.to_string()),
            chain: None,
        }
    }

    pub fn kind(&self) -> Option<MatcherKind> {
        self.kind
    }

    /// Evaluate against `actual`, following the `doMatch` chain on the value
    /// extracted by this matcher (or `actual` when nothing was extracted).
    pub fn evaluate(&self, actual: &str) -> bool {
        let (matched, extracted) = self.rule.evaluate(actual);
        if !matched {
            return false;
        }
        match &self.chain {
            Some(next) => next.evaluate(extracted.as_deref().unwrap_or(actual)),
            None => true,
        }
    }
}

impl MatcherRule {
    fn evaluate(&self, actual: &str) -> (bool, Option<String>) {
        match self {
            MatcherRule::Exact(expected) => (expected == actual, None),
            MatcherRule::Glob(regex) | MatcherRule::Regex(regex) => (regex.is_match(actual), None),
            MatcherRule::Json(expected) => (json::equals(expected, actual), None),
            MatcherRule::JsonPartial(expected) => (json::partial(expected, actual), None),
            MatcherRule::JsonPath(path) => match json::query(path, actual) {
                Some(extracted) => (true, Some(extracted)),
                None => (false, None),
            },
            MatcherRule::Xml(expected) => (xml::canonical(actual).as_ref() == Some(expected), None),
            MatcherRule::XmlPartial(expected) => (xml::partial(expected, actual), None),
            MatcherRule::Xpath(expression) => match xml::extract_xpath(actual, expression) {
                Some(extracted) => (true, Some(extracted)),
                None => (false, None),
            },
            MatcherRule::Jwt(expected) => (json::jwt(expected, actual), None),
            MatcherRule::Form(fields) => {
                let form = RequestDetails::parse_query(actual);
                (fields.evaluate(&form).is_some(), None)
            }
            MatcherRule::Array(array) => (array.matches(actual), None),
            MatcherRule::Negate(inner) => (!inner.evaluate(actual), None),
            MatcherRule::Invalid => (false, None),
        }
    }
}

/// Render a declared value as the string a scalar matcher compares with.
pub fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Translate a glob (`*` wildcard) into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let pattern = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{pattern}$"))
}
