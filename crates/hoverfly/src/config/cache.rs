//! Result cache configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheConfig {
    /// Turn the result cache off entirely
    #[serde(default)]
    pub disabled: bool,
    /// Maximum number of cached outcomes (0 disables the cache)
    #[serde(default = "default_cache_size")]
    pub size: usize,
    /// Request headers included in the cache key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
}

fn default_cache_size() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            size: default_cache_size(),
            headers: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        !self.disabled && self.size > 0
    }
}
