//! Result cache keyed by request fingerprint.
//!
//! Remembers the outcome of a matching pass (the winning pair, or the miss
//! with its closest-miss diagnostic) so repeated requests skip the
//! matchers. Bounded by entry count with least-recently-used eviction.

use crate::model::{ClosestMiss, PairView};
use crate::simulation::SimulationPair;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("No cache set")]
    NoCacheSet,
}

/// Configuration for the result cache
#[derive(Clone, Debug)]
pub struct ResultCacheConfig {
    /// Disabled caches never store and reject inspection
    pub enabled: bool,
    /// Maximum number of entries (LRU eviction when exceeded, 0 = disabled)
    pub max_size: usize,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
        }
    }
}

/// A remembered matching outcome.
#[derive(Debug, Clone, Default)]
pub struct CachedResponse {
    pub matching_pair: Option<Arc<SimulationPair>>,
    pub closest_miss: Option<ClosestMiss>,
}

/// Serialized form of a cache entry for the admin API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponseView {
    pub key: String,
    pub matching_pair: Option<PairView>,
    pub closest_miss: Option<ClosestMiss>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    last_accessed: u64,
    access_count: u64,
}

/// Metrics for cache performance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub flushes: u64,
    pub size: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Entries and metrics behind a single lock.
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    metrics: CacheMetrics,
    /// Logical clock ordering accesses for LRU eviction.
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Fingerprint-keyed cache of matching outcomes.
pub struct ResultCache {
    enabled: bool,
    max_size: usize,
    state: RwLock<CacheState>,
}

impl ResultCache {
    pub fn new(config: ResultCacheConfig) -> Self {
        let enabled = config.enabled && config.max_size > 0;
        debug!(
            "Creating result cache: enabled={}, max_size={}",
            enabled, config.max_size
        );
        Self {
            enabled,
            max_size: config.max_size,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self::new(ResultCacheConfig {
            enabled: false,
            max_size: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up the outcome stored for `key`.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        if !self.enabled {
            return None;
        }

        let mut state = self.state.write();
        let now = state.tick();
        let found = state.entries.get_mut(key).map(|entry| {
            entry.last_accessed = now;
            entry.access_count += 1;
            (entry.response.clone(), entry.access_count)
        });

        match found {
            Some((response, access_count)) => {
                trace!("Cache hit for key: {} (access_count: {})", key, access_count);
                state.metrics.hits += 1;
                Some(response)
            }
            None => {
                trace!("Cache miss for key: {}", key);
                state.metrics.misses += 1;
                None
            }
        }
    }

    /// Store an outcome, evicting the least recently used entry when full.
    pub fn insert(&self, key: String, response: CachedResponse) {
        if !self.enabled {
            return;
        }

        let mut state = self.state.write();
        if state.entries.len() >= self.max_size && !state.entries.contains_key(&key) {
            Self::evict_lru(&mut state);
        }

        let now = state.tick();
        trace!("Cache insert for key: {}", key);
        state.entries.insert(
            key,
            CacheEntry {
                response,
                last_accessed: now,
                access_count: 0,
            },
        );
        state.metrics.inserts += 1;
        state.metrics.size = state.entries.len();
    }

    fn evict_lru(state: &mut CacheState) {
        if let Some(key_to_evict) = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(k, _)| k.clone())
        {
            state.entries.remove(&key_to_evict);
            state.metrics.evictions += 1;
            trace!("Evicted LRU entry: {}", key_to_evict);
        }
    }

    /// Drop every entry.
    pub fn flush(&self) -> Result<(), CacheError> {
        if !self.enabled {
            return Err(CacheError::NoCacheSet);
        }
        self.clear();
        Ok(())
    }

    /// Drop every entry; a no-op on a disabled cache.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.metrics.flushes += 1;
        state.metrics.size = 0;
        debug!("Cache flushed");
    }

    /// Current entries, most recently used first.
    pub fn entries(&self) -> Result<Vec<CachedResponseView>, CacheError> {
        if !self.enabled {
            return Err(CacheError::NoCacheSet);
        }
        let state = self.state.read();
        let mut entries: Vec<(&String, &CacheEntry)> = state.entries.iter().collect();
        entries.sort_by(|a, b| b.1.last_accessed.cmp(&a.1.last_accessed));
        Ok(entries
            .into_iter()
            .map(|(key, entry)| CachedResponseView {
                key: key.clone(),
                matching_pair: entry
                    .response
                    .matching_pair
                    .as_ref()
                    .map(|pair| pair.view().clone()),
                closest_miss: entry.response.closest_miss.clone(),
            })
            .collect())
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state.read().metrics.clone()
    }

    pub fn size(&self) -> usize {
        self.state.read().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatcherView, RequestMatcherView, ResponseView};
    use std::thread;

    fn cache(max_size: usize) -> ResultCache {
        ResultCache::new(ResultCacheConfig {
            enabled: true,
            max_size,
        })
    }

    fn hit(body: &str) -> CachedResponse {
        CachedResponse {
            matching_pair: Some(Arc::new(SimulationPair::compile(PairView {
                request: RequestMatcherView {
                    path: Some(vec![MatcherView::new("exact", "/")]),
                    ..Default::default()
                },
                response: ResponseView {
                    status: 200,
                    body: body.to_string(),
                    ..Default::default()
                },
            }))),
            closest_miss: None,
        }
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = cache(100);
        assert!(cache.get("k").is_none());

        cache.insert("k".to_string(), hit("cached"));
        let cached = cache.get("k").unwrap();
        assert_eq!(cached.matching_pair.unwrap().response().body, "cached");

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.inserts, 1);
        assert_eq!(metrics.size, 1);
        assert_eq!(metrics.hit_rate(), 0.5);
    }

    #[test]
    fn test_size_one_keeps_most_recent() {
        let cache = cache(1);
        cache.insert("first".to_string(), CachedResponse::default());
        cache.insert("second".to_string(), CachedResponse::default());

        let keys: Vec<String> = cache.entries().unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["second"]);
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn test_lru_eviction_prefers_stale_entries() {
        let cache = cache(2);
        cache.insert("a".to_string(), CachedResponse::default());
        cache.insert("b".to_string(), CachedResponse::default());
        cache.get("a");
        cache.insert("c".to_string(), CachedResponse::default());

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_reinserting_existing_key_does_not_evict() {
        let cache = cache(2);
        cache.insert("a".to_string(), CachedResponse::default());
        cache.insert("b".to_string(), CachedResponse::default());
        cache.insert("a".to_string(), hit("updated"));
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.metrics().evictions, 0);
    }

    #[test]
    fn test_flush() {
        let cache = cache(10);
        cache.insert("a".to_string(), CachedResponse::default());
        cache.flush().unwrap();
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_cache() {
        for cache in [ResultCache::disabled(), self::cache(0)] {
            assert!(!cache.is_enabled());
            cache.insert("a".to_string(), CachedResponse::default());
            assert!(cache.get("a").is_none());
            assert_eq!(cache.entries().unwrap_err(), CacheError::NoCacheSet);
            assert_eq!(cache.flush().unwrap_err().to_string(), "No cache set");
        }
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(cache(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("{t}-{i}");
                        cache.insert(key.clone(), CachedResponse::default());
                        cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.size() <= 50);
    }
}
