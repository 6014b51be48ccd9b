//! Server crate for the companion recommendation engine.
//!
//! This crate wires the data store, recall, ranking, filtering and the
//! configured algorithm into the `RecommendationOrchestrator`, together with
//! its TOML configuration and response cache.

pub mod algorithm_recall;
pub mod cache;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use cache::{InMemoryCache, NoopCache, RecommendCache};
pub use config::{CacheConfig, EngineConfig};
pub use error::{CacheError, ConfigError, RecommendError};
pub use orchestrator::{
    GameRecommendation, MasterRecommendation, RecommendationOrchestrator, RecommendationPage,
    SimilarityQuery,
};
