//! Error types for the serving layer.
//!
//! Data absence is never an error here: unknown users get popular masters
//! and unknown IDs score 0.0. These variants are the systemic failures.

use algorithms::AlgorithmError;
use data_loader::DataLoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Anything a cache backend can report; callers degrade to recomputation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cached value for {key} is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Error, Debug)]
pub enum RecommendError {
    /// The entity store could not be loaded
    #[error("Storage error: {0}")]
    Storage(#[from] DataLoadError),

    /// Training or evaluation failed
    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A blocking pipeline task panicked or was cancelled
    #[error("Pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RecommendError>;
