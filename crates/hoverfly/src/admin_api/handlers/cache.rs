//! Result cache handlers.

use crate::admin_api::types::*;
use crate::hoverfly::Hoverfly;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET /api/v2/cache
pub fn handle_get(hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    match hoverfly.cache_entries() {
        Ok(cache) => json_response(StatusCode::OK, &CacheView { cache }),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// DELETE /api/v2/cache
pub fn handle_delete(hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    match hoverfly.flush_cache() {
        Ok(()) => handle_get(hoverfly),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
