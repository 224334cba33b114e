//! Copy-on-write simulation store.

use super::{ResponseDelays, SimulationPair};
use crate::model::GlobalActionsView;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// An immutable snapshot of the loaded simulation.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    pub pairs: Vec<Arc<SimulationPair>>,
    pub global_actions: GlobalActionsView,
    pub delays: ResponseDelays,
}

/// Holds the current [`Simulation`] behind an atomically swapped pointer.
///
/// Readers take a snapshot and keep using it for the whole matching pass;
/// writers build a new snapshot and swap it in, so a reader never sees a
/// partially updated pair list.
#[derive(Debug, Default)]
pub struct SimulationStore {
    current: RwLock<Arc<Simulation>>,
}

impl SimulationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Simulation> {
        Arc::clone(&self.current.read())
    }

    /// Replace the whole simulation.
    pub fn replace(&self, simulation: Simulation) {
        debug!(pairs = simulation.pairs.len(), "Replacing simulation");
        *self.current.write() = Arc::new(simulation);
    }

    /// Append pairs, skipping any whose request matcher equals one already
    /// stored (or appended earlier in the same call).
    ///
    /// Returns the positions, within `pairs`, of the skipped entries.
    pub fn append(
        &self,
        pairs: Vec<SimulationPair>,
        global_actions: GlobalActionsView,
        delays: ResponseDelays,
    ) -> Vec<usize> {
        let mut guard = self.current.write();
        let mut next = Simulation::clone(&guard);
        let mut skipped = Vec::new();

        for (index, pair) in pairs.into_iter().enumerate() {
            let duplicate = next
                .pairs
                .iter()
                .any(|existing| existing.view().request == pair.view().request);
            if duplicate {
                skipped.push(index);
            } else {
                next.pairs.push(Arc::new(pair));
            }
        }

        if !delays.is_empty() {
            next.global_actions = global_actions;
            next.delays = delays;
        }

        debug!(
            pairs = next.pairs.len(),
            skipped = skipped.len(),
            "Appended to simulation"
        );
        *guard = Arc::new(next);
        skipped
    }

    /// Record a captured pair. A stored pair with an equal request matcher
    /// is replaced when `overwrite` is set and kept otherwise.
    ///
    /// Returns whether the simulation changed.
    pub fn record(&self, pair: SimulationPair, overwrite: bool) -> bool {
        let mut guard = self.current.write();
        let mut next = Simulation::clone(&guard);
        let existing = next
            .pairs
            .iter()
            .position(|stored| stored.view().request == pair.view().request);
        match existing {
            Some(index) if overwrite => next.pairs[index] = Arc::new(pair),
            Some(_) => return false,
            None => next.pairs.push(Arc::new(pair)),
        }
        *guard = Arc::new(next);
        true
    }

    pub fn clear(&self) {
        *self.current.write() = Arc::new(Simulation::default());
    }
}
