//! Engine configuration, loaded from an optional TOML file.
//!
//! Every field has a default, so an empty file and a missing file both give
//! the stock engine. A file that exists but does not parse is an error.
//!
//! ```toml
//! algorithm = "hybrid"
//!
//! [recall]
//! popularity_limit = 50
//!
//! [rank.final]
//! relevance = 0.5
//! diversity = 0.2
//! popularity = 0.3
//!
//! [filter.business]
//! min_score = 4.0
//!
//! [cache]
//! ttl_secs = 300
//! ```

use crate::error::ConfigError;
use algorithms::{AlgorithmKind, EvaluationConfig};
use pipeline::{FilterConfig, RankWeights};
use serde::{Deserialize, Serialize};
use sources::RecallConfig;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Top-level config structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Strategy behind algorithm recall, game recommendations and training
    pub algorithm: AlgorithmKind,
    pub recall: RecallConfig,
    pub rank: RankWeights,
    pub filter: FilterConfig,
    pub evaluation: EvaluationConfig,
    pub cache: CacheConfig,
}

/// The `[cache]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Lifetime of a cached recommendation list
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl EngineConfig {
    /// Load from `path`, or defaults when no path is given or it does not exist
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config = Self::parse(&contents).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
                debug!(path = %path.display(), "Loaded config from file");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_config() {
        let toml = r#"
algorithm = "content_based"

[recall]
popularity_limit = 20

[rank.final]
relevance = 1.0
diversity = 0.0
popularity = 0.0

[filter.business]
min_score = 3.5

[cache]
ttl_secs = 60
"#;
        let config = EngineConfig::parse(toml).unwrap();
        assert_eq!(config.algorithm, AlgorithmKind::ContentBased);
        assert_eq!(config.recall.popularity_limit, 20);
        assert_eq!(config.recall.preference_limit, 100);
        assert_eq!(config.rank.final_blend.relevance, 1.0);
        assert_eq!(config.filter.business.min_score, 3.5);
        assert_eq!(config.filter.business.min_orders, 10);
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.algorithm, AlgorithmKind::Hybrid);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(Some(&dir.path().join("engine.toml"))).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(EngineConfig::load(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "algorithm = [not toml").unwrap();
        let err = EngineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
