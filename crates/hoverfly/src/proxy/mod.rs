//! Proxy listener.
//!
//! Normalizes incoming requests into [`RequestDetails`](crate::model::RequestDetails),
//! dispatches them by mode and renders matching failures as `502`.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct and accept loop
//! - `handler` - request normalization and mode dispatch
//! - `forward` - forwarding to the real destination (capture, spy)
//! - `miss` - the plain-text body of a failed match

mod forward;
mod handler;
mod miss;
mod server;

pub use handler::request_details;
pub use miss::render_miss;
pub use server::ProxyServer;
