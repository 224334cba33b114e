//! Hoverfly service virtualization.
//!
//! Requests reaching the proxy are resolved against a simulation of
//! request matcher / response pairs. Matching outcomes are cached by
//! request fingerprint, and pairs may be gated on, and mutate, a global
//! key-value state.

pub mod admin_api;
pub mod config;
pub mod hoverfly;
pub mod matching;
pub mod model;
pub mod modes;
pub mod proxy;
pub mod simulation;
pub mod state;

pub use hoverfly::{Hoverfly, MatchError};
