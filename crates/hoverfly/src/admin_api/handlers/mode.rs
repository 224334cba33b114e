//! Mode handlers.

use crate::admin_api::types::*;
use crate::hoverfly::Hoverfly;
use crate::modes::ModeView;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::warn;

/// GET /api/v2/hoverfly/mode
pub fn handle_get(hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &hoverfly.mode_settings().to_view())
}

/// PUT /api/v2/hoverfly/mode
pub fn handle_put(hoverfly: &Hoverfly, body: &[u8]) -> Response<Full<Bytes>> {
    let view: ModeView = match serde_json::from_slice(body) {
        Ok(view) => view,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match hoverfly.set_mode(&view) {
        Ok(()) => handle_get(hoverfly),
        Err(e) => {
            warn!(mode = %view.mode, "{}", e);
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}
