//! Global state handlers.

use crate::admin_api::types::*;
use crate::hoverfly::Hoverfly;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET /api/v2/state
pub fn handle_get(hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "state": hoverfly.get_state() }),
    )
}

/// PUT /api/v2/state
pub fn handle_put(hoverfly: &Hoverfly, body: &[u8]) -> Response<Full<Bytes>> {
    match serde_json::from_slice::<StateView>(body) {
        Ok(view) => {
            hoverfly.replace_state(view.state);
            handle_get(hoverfly)
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// PATCH /api/v2/state
pub fn handle_patch(hoverfly: &Hoverfly, body: &[u8]) -> Response<Full<Bytes>> {
    match serde_json::from_slice::<StateView>(body) {
        Ok(view) => {
            hoverfly.patch_state(view.state);
            handle_get(hoverfly)
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// DELETE /api/v2/state
pub fn handle_delete(hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    hoverfly.delete_state(&[]);
    build_response(StatusCode::OK, Bytes::new())
}
