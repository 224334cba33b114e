//! Normalized request handed to the matching core.

use md5::{Digest, Md5};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

static XML_WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn xml_whitespace() -> &'static Regex {
    XML_WHITESPACE.get_or_init(|| Regex::new(r">\s+<").expect("static regex is valid"))
}

/// A request as seen by the matchers.
///
/// Header names keep the casing they arrived with; lookups through
/// [`RequestDetails::header`] are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub path: String,
    pub method: String,
    pub destination: String,
    pub scheme: String,
    #[serde(default)]
    pub query: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RequestDetails {
    /// Parse a raw query string (without the leading `?`) into the
    /// multi-valued map used for matching.
    pub fn parse_query(raw: &str) -> BTreeMap<String, Vec<String>> {
        let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            query
                .entry(decode_component(key))
                .or_default()
                .push(decode_component(value));
        }
        query
    }

    /// Canonical query string: keys sorted, values kept in arrival order,
    /// not percent-encoded.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| format!("{key}={v}")))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Values of a header joined with `;`, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.join(";"))
    }

    /// Whether the body is declared or looks like JSON.
    pub fn is_json(&self) -> bool {
        match self.header("Content-Type") {
            Some(ct) if ct.to_ascii_lowercase().contains("json") => true,
            Some(ct) if ct.to_ascii_lowercase().contains("xml") => false,
            _ => serde_json::from_str::<serde_json::Value>(&self.body).is_ok(),
        }
    }

    /// Body with insignificant formatting removed, so that differently
    /// indented JSON or XML payloads share a fingerprint.
    pub fn minified_body(&self) -> String {
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if json.is_object() || json.is_array() {
                return json.to_string();
            }
        }
        if trimmed.starts_with('<') && sxd_document::parser::parse(trimmed).is_ok() {
            return xml_whitespace().replace_all(trimmed, "><").into_owned();
        }
        self.body.clone()
    }

    /// Stable md5 fingerprint used as the result cache key.
    ///
    /// The destination is left out when running as a webserver. Headers are
    /// only part of the key when named in `cache_headers`.
    pub fn fingerprint(&self, webserver: bool, cache_headers: &[String]) -> String {
        let mut material = String::new();
        if !webserver {
            material.push_str(&self.destination);
        }
        material.push_str(&self.path);
        material.push_str(&self.method);
        material.push_str(&self.query_string());
        material.push_str(&self.minified_body());

        let mut names: Vec<String> = cache_headers.iter().map(|h| h.to_ascii_lowercase()).collect();
        names.sort();
        names.dedup();
        for name in names {
            if let Some(value) = self.header(&name) {
                material.push_str(&name);
                material.push(':');
                material.push_str(&value);
            }
        }

        hex::encode(Md5::digest(material.as_bytes()))
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}
