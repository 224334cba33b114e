//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{cache, mode, simulation, state, system};
use crate::admin_api::types::{collect_body, error_response, not_found};
use crate::hoverfly::Hoverfly;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    hoverfly: Arc<Hoverfly>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Admin API: {} {}", method, path);

    let body = match collect_body(req).await {
        Ok(body) => body,
        Err(e) => return Ok(error_response(StatusCode::BAD_REQUEST, &e)),
    };
    Ok(route(&method, &path, &body, &hoverfly))
}

/// Dispatch an admin request whose body has already been read.
pub fn route(method: &Method, path: &str, body: &[u8], hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match (method, path) {
        (&Method::GET, "/api/health") => system::handle_health(),

        (&Method::GET, "/api/v2/simulation") => simulation::handle_get(hoverfly),
        (&Method::PUT, "/api/v2/simulation") => simulation::handle_put(hoverfly, body),
        (&Method::POST, "/api/v2/simulation") => simulation::handle_post(hoverfly, body),
        (&Method::DELETE, "/api/v2/simulation") => simulation::handle_delete(hoverfly),

        (&Method::GET, "/api/v2/cache") => cache::handle_get(hoverfly),
        (&Method::DELETE, "/api/v2/cache") => cache::handle_delete(hoverfly),

        (&Method::GET, "/api/v2/state") => state::handle_get(hoverfly),
        (&Method::PUT, "/api/v2/state") => state::handle_put(hoverfly, body),
        (&Method::PATCH, "/api/v2/state") => state::handle_patch(hoverfly, body),
        (&Method::DELETE, "/api/v2/state") => state::handle_delete(hoverfly),

        (&Method::GET, "/api/v2/hoverfly/mode") => mode::handle_get(hoverfly),
        (&Method::PUT, "/api/v2/hoverfly/mode") => mode::handle_put(hoverfly, body),

        _ => not_found(),
    }
}
