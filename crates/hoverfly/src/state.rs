//! Global state consulted by `requiresState` and mutated by matches.

use crate::model::ResponseView;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Initial value of a `sequence:*` key.
pub const SEQUENCE_START: &str = "1";

/// Process-wide key/value state of one Hoverfly instance.
///
/// A matching pass holds the lock from the `requiresState` check until the
/// winning pair's transitions are applied, so concurrent requests cannot
/// both advance the same sequence step.
#[derive(Debug, Default)]
pub struct StateStore {
    data: Mutex<HashMap<String, String>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state for a read-decide-write matching pass.
    pub fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.data.lock()
    }

    /// Sorted copy of the current state.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the whole state.
    pub fn replace(&self, state: HashMap<String, String>) {
        *self.data.lock() = state;
    }

    /// Upsert the given keys, keeping the rest.
    pub fn patch(&self, state: HashMap<String, String>) {
        self.data.lock().extend(state);
    }

    pub fn remove(&self, keys: &[String]) {
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
    }

    pub fn clear(&self) {
        self.data.lock().clear();
        debug!("State cleared");
    }
}

/// Set each sequence key to its first step. With `overwrite` unset, keys
/// that already exist keep their current step.
pub fn initialize_sequences<'a>(
    state: &mut HashMap<String, String>,
    keys: impl IntoIterator<Item = &'a String>,
    overwrite: bool,
) {
    for key in keys {
        if overwrite || !state.contains_key(key) {
            state.insert(key.clone(), SEQUENCE_START.to_string());
        }
    }
}

/// Apply a matched response's `transitionsState` then `removesState`.
pub fn apply_transitions(state: &mut HashMap<String, String>, response: &ResponseView) {
    for (key, value) in &response.transitions_state {
        state.insert(key.clone(), value.clone());
    }
    for key in &response.removes_state {
        state.remove(key);
    }
    if !response.transitions_state.is_empty() || !response.removes_state.is_empty() {
        debug!(
            set = ?response.transitions_state,
            removed = ?response.removes_state,
            "Applied state transitions"
        );
    }
}
