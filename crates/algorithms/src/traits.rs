//! The contract shared by every recommendation strategy.

use crate::error::Result;
use crate::hybrid::HybridWeights;
use crate::metrics::RecommendMetrics;
use data_loader::{GameId, MasterId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which strategy the engine runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Collaborative,
    ContentBased,
    #[default]
    Hybrid,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::Collaborative => "collaborative",
            AlgorithmKind::ContentBased => "content_based",
            AlgorithmKind::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "collaborative" | "cf" => Ok(AlgorithmKind::Collaborative),
            "content_based" | "content" => Ok(AlgorithmKind::ContentBased),
            "hybrid" => Ok(AlgorithmKind::Hybrid),
            other => Err(format!(
                "unknown algorithm '{}' (expected collaborative, content_based or hybrid)",
                other
            )),
        }
    }
}

/// An item with the score a strategy gave it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem<T> {
    pub id: T,
    pub score: f64,
}

impl<T> ScoredItem<T> {
    pub fn new(id: T, score: f64) -> Self {
        Self { id, score }
    }
}

/// Summary of one successful training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub algorithm: AlgorithmKind,
    /// Generation number now live
    pub generation: u64,
    pub users: usize,
    pub masters: usize,
    pub games: usize,
    /// Cached similarity pairs in the new generation
    pub similarity_pairs: usize,
    pub elapsed_ms: u128,
    /// Blend weights installed by a hybrid run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hybrid_weights: Option<HybridWeights>,
}

/// A freshly built generation that is not live yet.
///
/// Dropping it discards the generation; `commit` swaps it in.
pub struct PendingTraining<'a> {
    report: TrainingReport,
    install: Box<dyn FnOnce() + Send + 'a>,
}

impl<'a> PendingTraining<'a> {
    pub fn new(report: TrainingReport, install: impl FnOnce() + Send + 'a) -> Self {
        Self {
            report,
            install: Box::new(install),
        }
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn commit(self) -> TrainingReport {
        (self.install)();
        self.report
    }
}

/// Read-only view of a trained model, as consumed by the evaluator.
///
/// Strategies hand the evaluator a pinned generation, so a concurrent
/// training swap cannot change what an evaluation reads.
pub trait MasterRanker: Sync {
    /// Top `k` masters for a user, best first
    fn rank_masters(&self, user_id: UserId, k: usize) -> Vec<MasterId>;

    fn master_similarity(&self, a: MasterId, b: MasterId) -> f64;
}

/// A recommendation strategy.
///
/// Object-safe and shared as `Arc<dyn RecommendAlgorithm>`. Every method
/// is infallible at request time: unknown IDs and empty histories produce
/// empty lists and zero similarities.
pub trait RecommendAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> AlgorithmKind;

    /// Best masters for a user, optionally restricted to one game.
    ///
    /// Distinct IDs, at most `limit` entries, scores > 0, best first.
    fn recommend_masters(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
        limit: usize,
    ) -> Vec<ScoredItem<MasterId>>;

    fn recommend_games(&self, user_id: UserId, limit: usize) -> Vec<ScoredItem<GameId>>;

    fn user_master_similarity(&self, user_id: UserId, master_id: MasterId) -> f64;

    fn user_game_similarity(&self, user_id: UserId, game_id: GameId) -> f64;

    /// Symmetric, in [0, 1]
    fn master_similarity(&self, a: MasterId, b: MasterId) -> f64;

    /// Symmetric, in [0, 1]
    fn game_similarity(&self, a: GameId, b: GameId) -> f64;

    /// Recompute the cached state of one user in the live generation
    fn update_user_features(&self, user_id: UserId);

    /// Recompute one master and drop its cached similarity pairs
    fn update_master_features(&self, master_id: MasterId);

    /// Recompute one game and drop its cached similarity pairs
    fn update_game_features(&self, game_id: GameId);

    /// Build a complete new generation without installing it.
    ///
    /// On error nothing changes.
    fn prepare_training(&self) -> Result<PendingTraining<'_>>;

    /// Build a complete new generation and swap it in.
    ///
    /// On error the previous generation stays live.
    fn train_model(&self) -> Result<TrainingReport> {
        Ok(self.prepare_training()?.commit())
    }

    /// Offline metrics against a pinned generation
    fn evaluate_model(&self) -> Result<RecommendMetrics>;
}

/// Drop zero scores, sort best first (ties by ascending ID), truncate.
pub fn top_n<T: Copy + Ord>(mut items: Vec<ScoredItem<T>>, limit: usize) -> Vec<ScoredItem<T>> {
    if limit == 0 {
        return Vec::new();
    }
    items.retain(|item| item.score > 0.0 && item.score.is_finite());
    items.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
    items.truncate(limit);
    items
}
