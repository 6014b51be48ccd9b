//! Feature-weighted ranking of recalled candidates.
//!
//! ## Scoring
//! ```text
//! relevance  = 0.4·tag + 0.3·game_type + 0.2·region + 0.1·age      (each term and the sum clamped to [0, 1])
//! diversity  = 0.5·categories_sat + 0.3·feature_diversity + 0.2·novelty
//! popularity = 0.4·rating/5 + 0.3·orders_sat + 0.2·views_sat + 0.1·likes_sat
//! final      = 0.4·relevance + 0.3·diversity + 0.3·popularity
//! ```
//! All weights and saturation points live in [`RankWeights`].

use crate::features::{FeatureExtractor, RankingFeatures};
use data_loader::DataIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sources::{Candidate, UserContext};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceWeights {
    pub tag: f64,
    pub game_type: f64,
    pub region: f64,
    pub age: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            tag: 0.4,
            game_type: 0.3,
            region: 0.2,
            age: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityWeights {
    pub categories: f64,
    pub feature_diversity: f64,
    pub novelty: f64,
}

impl Default for DiversityWeights {
    fn default() -> Self {
        Self {
            categories: 0.5,
            feature_diversity: 0.3,
            novelty: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopularityWeights {
    pub rating: f64,
    pub orders: f64,
    pub views: f64,
    pub likes: f64,
}

impl Default for PopularityWeights {
    fn default() -> Self {
        Self {
            rating: 0.4,
            orders: 0.3,
            views: 0.2,
            likes: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalWeights {
    pub relevance: f64,
    pub diversity: f64,
    pub popularity: f64,
}

impl Default for FinalWeights {
    fn default() -> Self {
        Self {
            relevance: 0.4,
            diversity: 0.3,
            popularity: 0.3,
        }
    }
}

/// Values at which a count stops adding to its sub-score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Saturation {
    pub categories: f64,
    pub orders: f64,
    pub views: f64,
    pub likes: f64,
}

impl Default for Saturation {
    fn default() -> Self {
        Self {
            categories: 5.0,
            orders: 500.0,
            views: 5000.0,
            likes: 1000.0,
        }
    }
}

/// Every ranking constant, loadable from the `[rank]` config section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankWeights {
    pub relevance: RelevanceWeights,
    pub diversity: DiversityWeights,
    pub popularity: PopularityWeights,
    #[serde(rename = "final")]
    pub final_blend: FinalWeights,
    pub saturation: Saturation,
}

/// Sub-scores and final score for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub relevance: f64,
    pub diversity: f64,
    pub popularity: f64,
    pub score: f64,
}

impl RankWeights {
    pub fn relevance(&self, f: &RankingFeatures) -> f64 {
        let w = &self.relevance;
        (w.tag * unit(f.tag_similarity)
            + w.game_type * unit(f.game_type_match)
            + w.region * unit(f.region_match)
            + w.age * unit(f.age_match))
            .clamp(0.0, 1.0)
    }

    pub fn diversity(&self, f: &RankingFeatures) -> f64 {
        let w = &self.diversity;
        w.categories * saturate(f.category_count as f64, self.saturation.categories)
            + w.feature_diversity * f.feature_diversity
            + w.novelty * f.novelty
    }

    pub fn popularity(&self, f: &RankingFeatures) -> f64 {
        let w = &self.popularity;
        let sat = &self.saturation;
        w.rating * f.rating / 5.0
            + w.orders * saturate(f.order_count as f64, sat.orders)
            + w.views * saturate(f.view_count, sat.views)
            + w.likes * saturate(f.like_count, sat.likes)
    }

    pub fn breakdown(&self, f: &RankingFeatures) -> ScoreBreakdown {
        let relevance = self.relevance(f);
        let diversity = self.diversity(f);
        let popularity = self.popularity(f);
        let w = &self.final_blend;
        ScoreBreakdown {
            relevance,
            diversity,
            popularity,
            score: w.relevance * relevance + w.diversity * diversity + w.popularity * popularity,
        }
    }
}

fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn saturate(value: f64, saturation: f64) -> f64 {
    if saturation <= 0.0 {
        return 0.0;
    }
    value.min(saturation) / saturation
}

/// Scores candidates from their ranking features and sorts them.
#[derive(Clone)]
pub struct RankService {
    extractor: FeatureExtractor,
    weights: RankWeights,
}

impl RankService {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        Self::with_weights(data_index, RankWeights::default())
    }

    pub fn with_weights(data_index: Arc<DataIndex>, weights: RankWeights) -> Self {
        Self {
            extractor: FeatureExtractor::new(data_index),
            weights,
        }
    }

    pub fn weights(&self) -> &RankWeights {
        &self.weights
    }

    /// Score one candidate. Unknown masters and non-finite results score 0.0.
    pub fn score(&self, candidate: &Candidate, context: &UserContext) -> f64 {
        let Some(master) = self.extractor.data_index().get_master(candidate.master_id) else {
            return 0.0;
        };
        let features = self.extractor.ranking_features(master, context);
        let score = self.weights.breakdown(&features).score;
        if score.is_finite() {
            score
        } else {
            warn!(master_id = candidate.master_id, "Non-finite rank score, using 0.0");
            0.0
        }
    }

    /// Overwrite each candidate's score and sort descending.
    ///
    /// The sort is stable: equal scores keep their input order.
    #[instrument(skip(self, candidates, context), fields(user_id = context.user_id, count = candidates.len()))]
    pub fn rank(&self, mut candidates: Vec<Candidate>, context: &UserContext) -> Vec<Candidate> {
        let scores: Vec<f64> = candidates
            .par_iter()
            .map(|c| self.score(c, context))
            .collect();

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.score = score;
        }
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!("Ranked {} candidates", candidates.len());
        candidates
    }
}
