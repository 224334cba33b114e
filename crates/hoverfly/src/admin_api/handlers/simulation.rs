//! Simulation handlers: export, replace, append and delete.

use crate::admin_api::types::*;
use crate::hoverfly::Hoverfly;
use crate::simulation::{ImportResult, SimulationError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::debug;

/// GET /api/v2/simulation
pub fn handle_get(hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &hoverfly.get_simulation())
}

/// PUT /api/v2/simulation
pub fn handle_put(hoverfly: &Hoverfly, body: &[u8]) -> Response<Full<Bytes>> {
    import(hoverfly, hoverfly.put_simulation(body))
}

/// POST /api/v2/simulation
pub fn handle_post(hoverfly: &Hoverfly, body: &[u8]) -> Response<Full<Bytes>> {
    import(hoverfly, hoverfly.add_simulation(body))
}

/// DELETE /api/v2/simulation
pub fn handle_delete(hoverfly: &Hoverfly) -> Response<Full<Bytes>> {
    hoverfly.delete_simulation();
    handle_get(hoverfly)
}

/// Warnings replace the echoed simulation in the response body.
fn import(
    hoverfly: &Hoverfly,
    result: Result<ImportResult, SimulationError>,
) -> Response<Full<Bytes>> {
    match result {
        Ok(result) if !result.warnings.is_empty() => json_response(StatusCode::OK, &result),
        Ok(_) => handle_get(hoverfly),
        Err(e) if e.is_bad_request() => {
            debug!(error = %e, "Rejected simulation");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("An error occurred: {e}"),
        ),
    }
}
