//! Admin REST API.
//!
//! Exposes the simulation, result cache, global state and mode under
//! `/api/v2`, plus `GET /api/health`. Bodies are JSON; failures are
//! reported as `{"error": "..."}`.

mod handlers;
mod router;
mod server;
mod types;

pub use router::route;
pub use server::AdminApiServer;
