//! Configuration types for Hoverfly.
//!
//! Loaded from a YAML file and then overridden by command line flags.

mod cache;
mod listen;

use std::path::{Path, PathBuf};

use crate::matching::MatchingStrategy;
use crate::modes::Mode;
use serde::{Deserialize, Serialize};

pub use cache::CacheConfig;
pub use listen::ListenConfig;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    /// Mode at start-up
    #[serde(default)]
    pub mode: Mode,

    /// Pair selection strategy for simulate and spy modes
    #[serde(default)]
    pub matching_strategy: MatchingStrategy,

    /// Serve simulations directly instead of acting as a proxy; the
    /// destination is then ignored for matching and fingerprints.
    #[serde(default)]
    pub webserver: bool,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Simulation files imported at start-up, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import: Vec<PathBuf>,

    /// Timeout for requests forwarded upstream in capture and spy modes
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
}

fn default_upstream_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            mode: Mode::default(),
            matching_strategy: MatchingStrategy::default(),
            webserver: false,
            cache: CacheConfig::default(),
            import: Vec::new(),
            upstream_timeout_seconds: default_upstream_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.proxy_port == self.listen.admin_port {
            anyhow::bail!(
                "Proxy and admin API cannot share port {}",
                self.listen.proxy_port
            );
        }

        if self.webserver && matches!(self.mode, Mode::Capture | Mode::Modify) {
            anyhow::bail!(
                "Mode '{}' is not available when running as a webserver",
                self.mode
            );
        }

        if self.upstream_timeout_seconds == 0 {
            anyhow::bail!("upstream_timeout_seconds must be greater than zero");
        }

        for path in &self.import {
            if path.as_os_str().is_empty() {
                anyhow::bail!("Empty path in 'import'");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.proxy_port, 8500);
        assert_eq!(config.listen.admin_port, 8888);
        assert_eq!(config.mode, Mode::Simulate);
        assert_eq!(config.matching_strategy, MatchingStrategy::Strongest);
        assert!(config.cache.is_enabled());
        assert_eq!(config.upstream_timeout_seconds, 30);
        config.validate().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
listen:
  host: 127.0.0.1
  proxy_port: 9500
  admin_port: 9888
mode: spy
matching_strategy: first
webserver: true
cache:
  size: 0
  headers: [Authorization]
import:
  - simulations/users.json
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.listen.proxy_addr().to_string(), "127.0.0.1:9500");
        assert_eq!(config.mode, Mode::Spy);
        assert_eq!(config.matching_strategy, MatchingStrategy::First);
        assert!(config.webserver);
        assert!(!config.cache.is_enabled());
        assert_eq!(config.cache.headers, vec!["Authorization"]);
        assert_eq!(config.import.len(), 1);
    }

    #[test]
    fn test_rejects_shared_port() {
        let config: Config =
            serde_yaml::from_str("listen: {proxy_port: 8000, admin_port: 8000}").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_capture_webserver() {
        let config: Config = serde_yaml::from_str("webserver: true\nmode: capture").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("webserver"));
    }
}
