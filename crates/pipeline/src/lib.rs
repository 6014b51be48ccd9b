//! Ranking, filtering and feature extraction for companion recommendations.
//!
//! This crate provides:
//! - FeatureExtractor for similarity vectors and per-request ranking features
//! - Cosine similarity with symmetric DashMap-backed caches
//! - RankService for relevance/diversity/popularity scoring
//! - Filter trait, concrete filters and FilterPipeline for composing them
//! - FilterService, the fixed filter chain ending in a diversity rerank
//!
//! ## Architecture
//! The online pipeline processes candidates in stages:
//! 1. Recall (in `sources`) proposes candidates
//! 2. RankService scores and sorts them
//! 3. FilterService drops what may not be shown and spreads categories
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{FilterConfig, FilterService, RankService};
//!
//! let ranked = RankService::new(index.clone()).rank(candidates, &context);
//! let shown = FilterService::new(index.clone(), &FilterConfig::default())
//!     .filter(ranked, &context);
//! ```

pub mod features;
pub mod filter_pipeline;
pub mod filter_service;
pub mod filters;
pub mod rank;
pub mod rerank;
pub mod similarity;
pub mod traits;

// Re-export main types
pub use features::{FeatureExtractor, GAME_VECTOR_LEN, MASTER_VECTOR_LEN, RankingFeatures};
pub use filter_pipeline::FilterPipeline;
pub use filter_service::{FilterConfig, FilterService};
pub use rank::{RankService, RankWeights, ScoreBreakdown};
pub use rerank::DiversityRerank;
pub use similarity::{SimilarityCache, SimilarityEngine, VectorCache, cosine_similarity, sparse_cosine};
pub use traits::{Filter, OnFailure};

#[cfg(test)]
pub(crate) mod test_fixtures {
    use data_loader::{DataIndex, GameMaster, MasterId, MasterStatus};
    use sources::{Candidate, CandidateSource};
    use std::sync::Arc;

    /// Online master passing the default business rules
    pub fn master(id: MasterId) -> GameMaster {
        GameMaster {
            id,
            nickname: format!("master{}", id),
            gender: None,
            age: None,
            region: None,
            level: None,
            score: Some(4.5),
            order_count: 50,
            status: MasterStatus::Online,
            price: Some(60.0),
            game_types: vec![],
            games: vec![],
            tags: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    pub fn index_with(masters: Vec<GameMaster>) -> Arc<DataIndex> {
        let mut index = DataIndex::new();
        for m in masters {
            index.insert_master(m);
        }
        index.build_secondary_indices();
        Arc::new(index)
    }

    pub fn candidate(id: MasterId, score: f64) -> Candidate {
        Candidate::new(id, CandidateSource::Preference, score)
    }
}
