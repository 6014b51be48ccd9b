//! Recommendation strategies and offline evaluation.
//!
//! This crate provides:
//! - The `RecommendAlgorithm` contract shared by every strategy
//! - CollaborativeFiltering over implicit ratings and feature-vector cosine
//! - ContentBased over sparse tag weights
//! - HybridAlgorithm, fusing both and re-balancing itself after training
//! - MetricsEvaluator and RecommendMetrics for offline quality checks
//!
//! ## Generations
//! Each strategy keeps its caches in one model generation behind
//! `RwLock<Arc<_>>`. Training builds the next generation off to the side and
//! swaps it in only once every value checks out, so a failed run leaves the
//! live model untouched.
//!
//! ## Example Usage
//! ```ignore
//! use algorithms::{AlgorithmKind, EvaluationConfig, create_algorithm};
//!
//! let algorithm = create_algorithm(AlgorithmKind::Hybrid, index.clone(), EvaluationConfig::default());
//! algorithm.train_model()?;
//! let top = algorithm.recommend_masters(user_id, None, 10);
//! ```

pub mod collaborative;
pub mod content_based;
pub mod error;
pub mod evaluation;
pub mod hybrid;
pub mod metrics;
pub mod rating;
pub mod tag_weight;
pub mod traits;

// Re-export main types
pub use collaborative::CollaborativeFiltering;
pub use content_based::ContentBased;
pub use error::{AlgorithmError, Result};
pub use evaluation::{EvaluationConfig, MetricsEvaluator};
pub use hybrid::{HybridAlgorithm, HybridWeights};
pub use metrics::{MetricValues, RecommendMetrics};
pub use tag_weight::{TagWeigher, TagWeights};
pub use traits::{
    AlgorithmKind, MasterRanker, PendingTraining, RecommendAlgorithm, ScoredItem, TrainingReport,
};

use data_loader::DataIndex;
use std::sync::Arc;

/// Build the strategy named by `kind`
pub fn create_algorithm(
    kind: AlgorithmKind,
    data: Arc<DataIndex>,
    evaluation: EvaluationConfig,
) -> Arc<dyn RecommendAlgorithm> {
    match kind {
        AlgorithmKind::Collaborative => Arc::new(CollaborativeFiltering::new(data, evaluation)),
        AlgorithmKind::ContentBased => Arc::new(ContentBased::new(data, evaluation)),
        AlgorithmKind::Hybrid => Arc::new(HybridAlgorithm::new(
            Arc::new(CollaborativeFiltering::new(data.clone(), evaluation.clone())),
            Arc::new(ContentBased::new(data, evaluation)),
        )),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_requested_kind() {
        let data = Arc::new(DataIndex::new());
        for kind in [AlgorithmKind::Collaborative, AlgorithmKind::ContentBased, AlgorithmKind::Hybrid] {
            let algorithm = create_algorithm(kind, data.clone(), EvaluationConfig::default());
            assert_eq!(algorithm.kind(), kind);
        }
    }
}
