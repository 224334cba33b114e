//! Simulation loading and storage.
//!
//! A simulation document is parsed and normalized by [`import`], compiled
//! into [`SimulationPair`]s and published through the copy-on-write
//! [`SimulationStore`].

mod delay;
mod error;
pub mod import;
mod store;

pub use delay::ResponseDelays;
pub use error::SimulationError;
pub use import::{ImportResult, ImportWarning};
pub use store::{Simulation, SimulationStore};

use crate::matching::CompiledRequestMatcher;
use crate::model::{PairView, ResponseView};

/// A declared pair together with its compiled request matcher.
#[derive(Debug, Clone)]
pub struct SimulationPair {
    view: PairView,
    request: CompiledRequestMatcher,
}

impl SimulationPair {
    pub fn compile(view: PairView) -> Self {
        let request = CompiledRequestMatcher::compile(&view.request);
        Self { view, request }
    }

    pub fn view(&self) -> &PairView {
        &self.view
    }

    pub fn matcher(&self) -> &CompiledRequestMatcher {
        &self.request
    }

    pub fn response(&self) -> &ResponseView {
        &self.view.response
    }
}
