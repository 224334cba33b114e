//! Data model shared by the matching core, the simulation store and the
//! admin API.
//!
//! The `*View` types are the serde shapes of a simulation document
//! (schema `v5`). They are compiled into runtime matchers by
//! [`crate::matching`] when a simulation is imported.

mod request;
mod simulation;

pub use request::RequestDetails;
pub use simulation::{
    ClosestMiss, DataView, DelayView, GlobalActionsView, LogNormalDelayView, LogNormalParams,
    MatcherView, MetaView, PairView, RequestMatcherView, ResponseView, SimulationView,
    CURRENT_SCHEMA_VERSION,
};
