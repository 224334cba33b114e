//! The shared resolution context.
//!
//! [`Hoverfly`] owns the simulation, the global state, the result cache and
//! the current mode. Both the proxy and the admin API hold it behind an
//! `Arc`.
//!
//! Lock order: the state lock is taken first and held across cache access,
//! so a matching pass never races an import or a flush into caching a
//! stale outcome.

use crate::config::Config;
use crate::matching::{
    select, CacheError, CachedResponse, CachedResponseView, CompiledMatcher, MatchingStrategy,
    ResultCache, ResultCacheConfig,
};
use crate::model::{
    ClosestMiss, DataView, MatcherView, MetaView, PairView, RequestDetails, RequestMatcherView,
    ResponseView, SimulationView,
};
use crate::modes::{Mode, ModeError, ModeSettings, ModeView};
use crate::simulation::import::{self, sequence_keys};
use crate::simulation::{
    ImportResult, ImportWarning, Simulation, SimulationError, SimulationPair, SimulationStore,
};
use crate::state::{apply_transitions, initialize_sequences, StateStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// No pair answers the request.
#[derive(Debug, Clone, Error)]
#[error("Could not find a match for request, create or record a valid matcher first!")]
pub struct MatchError {
    pub closest_miss: Option<ClosestMiss>,
    /// Global state when the miss happened
    pub state: BTreeMap<String, String>,
}

pub struct Hoverfly {
    webserver: bool,
    cache_headers: Vec<String>,
    mode: RwLock<ModeSettings>,
    simulation: SimulationStore,
    state: StateStore,
    cache: ResultCache,
}

impl Hoverfly {
    pub fn new(config: &Config) -> Self {
        let cache = if config.cache.is_enabled() {
            ResultCache::new(ResultCacheConfig {
                enabled: true,
                max_size: config.cache.size,
            })
        } else {
            ResultCache::disabled()
        };

        Self {
            webserver: config.webserver,
            cache_headers: config.cache.headers.clone(),
            mode: RwLock::new(ModeSettings {
                mode: config.mode,
                matching_strategy: config.matching_strategy,
                ..ModeSettings::default()
            }),
            simulation: SimulationStore::new(),
            state: StateStore::new(),
            cache,
        }
    }

    pub fn is_webserver(&self) -> bool {
        self.webserver
    }

    /// Resolve `request` against the simulation.
    ///
    /// A cached outcome is reused when present; a matched pair's state
    /// transitions are applied either way.
    pub fn get_response(&self, request: &RequestDetails) -> Result<Arc<SimulationPair>, MatchError> {
        let strategy = self.mode.read().matching_strategy;
        let key = request.fingerprint(self.webserver, &self.cache_headers);
        let mut state = self.state.lock();

        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "Serving cached matching outcome");
            return resolve(cached.matching_pair, cached.closest_miss, &mut state);
        }

        let simulation = self.simulation.snapshot();
        let result = select(strategy, &simulation.pairs, request, self.webserver, &state);
        if result.cachable {
            self.cache.insert(
                key,
                CachedResponse {
                    matching_pair: result.pair.clone(),
                    closest_miss: result.closest_miss.clone().map(|miss| ClosestMiss {
                        state: BTreeMap::new(),
                        ..miss
                    }),
                },
            );
        }
        resolve(result.pair, result.closest_miss, &mut state)
    }

    /// Delay to apply before sending `response`.
    pub fn delay_for(&self, request: &RequestDetails, response: &ResponseView) -> Option<Duration> {
        self.simulation.snapshot().delays.delay_for(request, response)
    }

    // Simulation

    pub fn get_simulation(&self) -> SimulationView {
        let simulation = self.simulation.snapshot();
        SimulationView {
            data: DataView {
                pairs: simulation.pairs.iter().map(|p| p.view().clone()).collect(),
                global_actions: simulation.global_actions.clone(),
            },
            meta: MetaView::exported_now(),
        }
    }

    /// Replace the simulation with the document in `body`.
    ///
    /// Clears the cache and the state, then starts every sequence the new
    /// pairs require at its first step.
    pub fn put_simulation(&self, body: &[u8]) -> Result<ImportResult, SimulationError> {
        let prepared = import::prepare(import::parse_simulation(body)?)?;
        let keys = sequence_keys(prepared.pairs.iter().map(SimulationPair::view));
        let pairs = prepared.pairs.len();

        let mut state = self.state.lock();
        self.simulation.replace(Simulation {
            pairs: prepared.pairs.into_iter().map(Arc::new).collect(),
            global_actions: prepared.global_actions,
            delays: prepared.delays,
        });
        self.cache.clear();
        state.clear();
        initialize_sequences(&mut state, &keys, true);

        info!(pairs, warnings = prepared.warnings.len(), "Simulation replaced");
        Ok(ImportResult {
            warnings: prepared.warnings,
        })
    }

    /// Append the pairs of the document in `body`.
    ///
    /// Pairs whose request matcher is already loaded are dropped with a
    /// warning. Sequences already in progress keep their step.
    pub fn add_simulation(&self, body: &[u8]) -> Result<ImportResult, SimulationError> {
        let prepared = import::prepare(import::parse_simulation(body)?)?;
        let keys = sequence_keys(prepared.pairs.iter().map(SimulationPair::view));
        let mut warnings = prepared.warnings;

        let mut state = self.state.lock();
        let skipped =
            self.simulation
                .append(prepared.pairs, prepared.global_actions, prepared.delays);
        self.cache.clear();
        initialize_sequences(&mut state, &keys, false);

        warnings.extend(skipped.into_iter().map(ImportWarning::duplicate_pair));
        info!(warnings = warnings.len(), "Simulation extended");
        Ok(ImportResult { warnings })
    }

    pub fn delete_simulation(&self) {
        let _state = self.state.lock();
        self.simulation.clear();
        self.cache.clear();
        info!("Simulation deleted");
    }

    /// Store a pair built from a request forwarded in capture mode.
    pub fn save_pair(&self, request: &RequestDetails, response: ResponseView) {
        let settings = self.mode.read().clone();
        let view = PairView {
            request: capture_matcher(request, &settings),
            response,
        };

        let _state = self.state.lock();
        if self
            .simulation
            .record(SimulationPair::compile(view), settings.overwrite_duplicate)
        {
            self.cache.clear();
            debug!(path = %request.path, method = %request.method, "Captured pair");
        }
    }

    // Cache

    pub fn cache_entries(&self) -> Result<Vec<CachedResponseView>, CacheError> {
        self.cache.entries()
    }

    pub fn flush_cache(&self) -> Result<(), CacheError> {
        let _state = self.state.lock();
        self.cache.flush()
    }

    // State

    pub fn get_state(&self) -> BTreeMap<String, String> {
        self.state.snapshot()
    }

    pub fn replace_state(&self, state: HashMap<String, String>) {
        self.state.replace(state);
    }

    pub fn patch_state(&self, state: HashMap<String, String>) {
        self.state.patch(state);
    }

    /// Delete the given keys, or every key when `keys` is empty.
    pub fn delete_state(&self, keys: &[String]) {
        if keys.is_empty() {
            self.state.clear();
        } else {
            self.state.remove(keys);
        }
    }

    // Mode

    pub fn mode_settings(&self) -> ModeSettings {
        self.mode.read().clone()
    }

    /// Switch mode. Entering capture, or changing the matching strategy,
    /// invalidates every cached outcome; capture also resets the state.
    pub fn set_mode(&self, view: &ModeView) -> Result<(), ModeError> {
        let settings = ModeSettings::from_view(view, self.webserver)?;

        let mut state = self.state.lock();
        let mut current = self.mode.write();
        if settings.mode == Mode::Capture {
            self.cache.clear();
            state.clear();
        } else if settings.matching_strategy != current.matching_strategy {
            self.cache.clear();
        }

        info!(
            mode = %settings.mode,
            matching_strategy = %settings.matching_strategy,
            "Mode changed"
        );
        *current = settings;
        Ok(())
    }

    pub fn matching_strategy(&self) -> MatchingStrategy {
        self.mode.read().matching_strategy
    }
}

fn resolve(
    pair: Option<Arc<SimulationPair>>,
    closest_miss: Option<ClosestMiss>,
    state: &mut HashMap<String, String>,
) -> Result<Arc<SimulationPair>, MatchError> {
    match pair {
        Some(pair) => {
            apply_transitions(state, pair.response());
            Ok(pair)
        }
        None => {
            let state: BTreeMap<String, String> =
                state.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Err(MatchError {
                closest_miss: closest_miss.map(|miss| ClosestMiss {
                    state: state.clone(),
                    ..miss
                }),
                state,
            })
        }
    }
}

fn exact(value: &str) -> Option<Vec<MatcherView>> {
    Some(vec![MatcherView::new("exact", value)])
}

/// Structural matcher for JSON and XML bodies, `exact` for anything else
/// or for a body the structural matcher cannot read.
fn body_matcher(request: &RequestDetails) -> MatcherView {
    let structural = if request.body.is_empty() {
        None
    } else if request.is_json() {
        Some("json")
    } else if request
        .header("Content-Type")
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("xml"))
    {
        Some("xml")
    } else {
        None
    };

    structural
        .map(|kind| MatcherView::new(kind, request.body.as_str()))
        .filter(|view| CompiledMatcher::compile(view).is_ok())
        .unwrap_or_else(|| MatcherView::new("exact", request.body.as_str()))
}

/// Request matcher recorded for a captured request: exact on every
/// field, structural on JSON and XML bodies, whitelisted headers only.
fn capture_matcher(request: &RequestDetails, settings: &ModeSettings) -> RequestMatcherView {
    let query = (!request.query.is_empty()).then(|| {
        request
            .query
            .iter()
            .map(|(key, values)| {
                (key.clone(), vec![MatcherView::new("exact", values.join(";"))])
            })
            .collect()
    });

    let headers: BTreeMap<_, _> = request
        .headers
        .iter()
        .filter(|(name, _)| settings.records_header(name))
        .map(|(name, values)| {
            (name.clone(), vec![MatcherView::new("exact", values.join(";"))])
        })
        .collect();

    RequestMatcherView {
        path: exact(&request.path),
        method: exact(&request.method),
        destination: exact(&request.destination),
        scheme: exact(&request.scheme),
        body: Some(vec![body_matcher(request)]),
        headers: (!headers.is_empty()).then_some(headers),
        query,
        ..RequestMatcherView::default()
    }
}
