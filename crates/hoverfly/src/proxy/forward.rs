//! Forwarding requests to their real destination.
//!
//! Used by capture mode (which records the exchange) and by spy mode for
//! requests the simulation cannot answer.

use crate::model::{RequestDetails, ResponseView};
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use hyper::http::request::Parts;
use std::collections::BTreeMap;
use tracing::debug;

/// Headers that describe the hop rather than the message.
const HOP_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "proxy-connection",
    "keep-alive",
];

fn target_url(parts: &Parts, request: &RequestDetails) -> String {
    let query = parts
        .uri
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    format!(
        "{}://{}{}{}",
        request.scheme, request.destination, request.path, query
    )
}

/// Send the request upstream and read the whole response back as a
/// [`ResponseView`]. Bodies that are not UTF-8 come back base64 encoded.
pub(crate) async fn forward(
    client: &reqwest::Client,
    parts: &Parts,
    request: &RequestDetails,
    body: Bytes,
) -> anyhow::Result<ResponseView> {
    let url = target_url(parts, request);
    debug!("Forwarding to: {}", url);

    let mut upstream = client.request(parts.method.clone(), &url);
    for (name, value) in parts.headers.iter() {
        if !HOP_HEADERS.contains(&name.as_str()) {
            upstream = upstream.header(name, value);
        }
    }
    if !body.is_empty() {
        upstream = upstream.body(body);
    }

    let response = upstream
        .send()
        .await
        .with_context(|| format!("Failed to forward request to {url}"))?;

    let status = response.status().as_u16();
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in response.headers() {
        if name.as_str() == "transfer-encoding" {
            continue;
        }
        headers
            .entry(super::handler::canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from {url}"))?;
    let (body, encoded_body) = match String::from_utf8(bytes.to_vec()) {
        Ok(text) => (text, false),
        Err(_) => (STANDARD.encode(&bytes), true),
    };

    Ok(ResponseView {
        status,
        body,
        encoded_body,
        headers,
        ..ResponseView::default()
    })
}
