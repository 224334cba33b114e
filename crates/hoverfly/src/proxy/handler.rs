//! Request handling: normalization and dispatch by mode.

use super::forward::forward;
use super::miss::{error_heading, render_miss};
use crate::hoverfly::Hoverfly;
use crate::model::{RequestDetails, ResponseView};
use crate::modes::Mode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state of the proxy listener.
pub(crate) struct ProxyContext {
    pub hoverfly: Arc<Hoverfly>,
    pub client: reqwest::Client,
}

/// `content-type` becomes `Content-Type`.
pub(crate) fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Normalize a request for matching.
///
/// The destination comes from an absolute request URI when the client
/// talks to us as a proxy, otherwise from the `Host` header. The `Host`
/// header itself is not kept among the headers.
pub fn request_details(parts: &Parts, body: &[u8]) -> RequestDetails {
    let destination = parts
        .uri
        .authority()
        .map(|a| a.to_string())
        .or_else(|| {
            parts
                .headers
                .get(hyper::header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in parts.headers.iter() {
        if name == hyper::header::HOST {
            continue;
        }
        headers
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    RequestDetails {
        path: parts.uri.path().to_string(),
        method: parts.method.as_str().to_string(),
        destination,
        scheme: parts.uri.scheme_str().unwrap_or("http").to_string(),
        query: RequestDetails::parse_query(parts.uri.query().unwrap_or("")),
        body: String::from_utf8_lossy(body).into_owned(),
        headers,
    }
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn hoverfly_error(context: &str, error: &str) -> Response<Full<Bytes>> {
    text_response(StatusCode::BAD_GATEWAY, error_heading(context, error))
}

/// Turn a stored response into an HTTP response.
fn build_response(view: &ResponseView) -> Response<Full<Bytes>> {
    let body = if view.encoded_body {
        match STANDARD.decode(&view.body) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                return hoverfly_error("decoding the body of the response", &e.to_string());
            }
        }
    } else {
        Bytes::from(view.body.clone())
    };

    let status = StatusCode::from_u16(view.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    for (name, values) in &view.headers {
        if name.eq_ignore_ascii_case("transfer-encoding") {
            continue;
        }
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        warn!("Invalid response in simulation: {}", e);
        hoverfly_error("building the response", &e.to_string())
    })
}

async fn serve(ctx: &ProxyContext, request: &RequestDetails, view: &ResponseView) -> Response<Full<Bytes>> {
    if let Some(delay) = ctx.hoverfly.delay_for(request, view) {
        debug!(delay_ms = delay.as_millis() as u64, "Delaying response");
        tokio::time::sleep(delay).await;
    }
    build_response(view)
}

async fn simulate(ctx: &ProxyContext, request: &RequestDetails) -> Response<Full<Bytes>> {
    match ctx.hoverfly.get_response(request) {
        Ok(pair) => serve(ctx, request, pair.response()).await,
        Err(e) => {
            info!(path = %request.path, method = %request.method, "No match for request");
            text_response(StatusCode::BAD_GATEWAY, render_miss(request, &e))
        }
    }
}

async fn spy(
    ctx: &ProxyContext,
    parts: &Parts,
    request: &RequestDetails,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match ctx.hoverfly.get_response(request) {
        Ok(pair) => serve(ctx, request, pair.response()).await,
        Err(_) => match forward(&ctx.client, parts, request, body).await {
            Ok(view) => build_response(&view),
            Err(e) => hoverfly_error(
                "forwarding the request to the intended destination",
                &format!("{e:#}"),
            ),
        },
    }
}

async fn capture(
    ctx: &ProxyContext,
    parts: &Parts,
    request: &RequestDetails,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match forward(&ctx.client, parts, request, body).await {
        Ok(view) => {
            let response = build_response(&view);
            ctx.hoverfly.save_pair(request, view);
            response
        }
        Err(e) => hoverfly_error(
            "forwarding the request to the intended destination",
            &format!("{e:#}"),
        ),
    }
}

/// Handle one proxied request.
pub(crate) async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<ProxyContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(hoverfly_error("reading the request body", &e.to_string()));
        }
    };

    let request = request_details(&parts, &body);
    let mode = ctx.hoverfly.mode_settings().mode;
    debug!(mode = %mode, method = %request.method, path = %request.path, "Proxy request");

    let response = match mode {
        Mode::Simulate => simulate(&ctx, &request).await,
        Mode::Spy => spy(&ctx, &parts, &request, body).await,
        Mode::Capture => capture(&ctx, &parts, &request, body).await,
        Mode::Synthesize | Mode::Modify | Mode::Diff => {
            hoverfly_error(&format!("running in {mode} mode"), "Middleware not set")
        }
    };
    Ok(response)
}
