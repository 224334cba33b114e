//! Request handlers, one module per resource.

pub mod cache;
pub mod mode;
pub mod simulation;
pub mod state;
pub mod system;
