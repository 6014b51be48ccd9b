//! Hybrid strategy: collaborative and content-based, fused.
//!
//! ## Fusion
//! - Lists: reciprocal rank fusion, `Σ weight / (position + 1)` per item.
//!   Items absent from a list get nothing from it.
//! - Scalars: `w_cf · cf + w_cb · cb`
//!
//! ## Self-tuning
//! After training both halves, each is evaluated and the blend weights are
//! renormalized in proportion to their overall scores.

use crate::error::Result;
use crate::metrics::RecommendMetrics;
use crate::traits::{AlgorithmKind, PendingTraining, RecommendAlgorithm, ScoredItem, TrainingReport};
use data_loader::{GameId, MasterId, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Blend weights, summing to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub collaborative: f64,
    pub content: f64,
    /// Bumped every time the weights are re-balanced
    pub version: u64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.6,
            content: 0.4,
            version: 0,
        }
    }
}

impl HybridWeights {
    /// Weights proportional to the two overall scores.
    ///
    /// Returns `self` unchanged when neither score is positive.
    pub fn rebalanced(&self, collaborative_score: f64, content_score: f64) -> Self {
        let cf = collaborative_score.max(0.0);
        let cb = content_score.max(0.0);
        let total = cf + cb;
        if total <= 0.0 || !total.is_finite() {
            return *self;
        }
        Self {
            collaborative: cf / total,
            content: cb / total,
            version: self.version + 1,
        }
    }
}

/// Reciprocal rank fusion of weighted ranked lists.
///
/// Equal fused scores keep first-seen order across the lists as given.
pub fn fuse<T: Copy + Eq + Hash>(lists: &[(f64, &[ScoredItem<T>])], limit: usize) -> Vec<ScoredItem<T>> {
    let mut order: Vec<ScoredItem<T>> = Vec::new();
    let mut slots: HashMap<T, usize> = HashMap::new();

    for &(weight, list) in lists {
        for (position, item) in list.iter().enumerate() {
            let contribution = weight / (position + 1) as f64;
            match slots.get(&item.id) {
                Some(&slot) => order[slot].score += contribution,
                None => {
                    slots.insert(item.id, order.len());
                    order.push(ScoredItem::new(item.id, contribution));
                }
            }
        }
    }

    order.retain(|item| item.score > 0.0 && item.score.is_finite());
    order.sort_by(|a, b| b.score.total_cmp(&a.score));
    order.truncate(limit);
    order
}

pub struct HybridAlgorithm {
    collaborative: Arc<dyn RecommendAlgorithm>,
    content: Arc<dyn RecommendAlgorithm>,
    weights: RwLock<HybridWeights>,
}

impl HybridAlgorithm {
    pub fn new(collaborative: Arc<dyn RecommendAlgorithm>, content: Arc<dyn RecommendAlgorithm>) -> Self {
        Self::with_weights(collaborative, content, HybridWeights::default())
    }

    pub fn with_weights(
        collaborative: Arc<dyn RecommendAlgorithm>,
        content: Arc<dyn RecommendAlgorithm>,
        weights: HybridWeights,
    ) -> Self {
        Self {
            collaborative,
            content,
            weights: RwLock::new(weights),
        }
    }

    /// Current blend weights, by value
    pub fn weights(&self) -> HybridWeights {
        *self.weights.read()
    }

    fn blend(&self, cf: f64, cb: f64) -> f64 {
        let w = self.weights();
        w.collaborative * cf + w.content * cb
    }
}

impl RecommendAlgorithm for HybridAlgorithm {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Hybrid
    }

    fn recommend_masters(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
        limit: usize,
    ) -> Vec<ScoredItem<MasterId>> {
        if limit == 0 {
            return Vec::new();
        }
        let w = self.weights();
        let (cf, cb) = rayon::join(
            || self.collaborative.recommend_masters(user_id, game_id, limit),
            || self.content.recommend_masters(user_id, game_id, limit),
        );
        fuse(&[(w.collaborative, &cf[..]), (w.content, &cb[..])], limit)
    }

    fn recommend_games(&self, user_id: UserId, limit: usize) -> Vec<ScoredItem<GameId>> {
        if limit == 0 {
            return Vec::new();
        }
        let w = self.weights();
        let (cf, cb) = rayon::join(
            || self.collaborative.recommend_games(user_id, limit),
            || self.content.recommend_games(user_id, limit),
        );
        fuse(&[(w.collaborative, &cf[..]), (w.content, &cb[..])], limit)
    }

    fn user_master_similarity(&self, user_id: UserId, master_id: MasterId) -> f64 {
        self.blend(
            self.collaborative.user_master_similarity(user_id, master_id),
            self.content.user_master_similarity(user_id, master_id),
        )
    }

    fn user_game_similarity(&self, user_id: UserId, game_id: GameId) -> f64 {
        self.blend(
            self.collaborative.user_game_similarity(user_id, game_id),
            self.content.user_game_similarity(user_id, game_id),
        )
    }

    fn master_similarity(&self, a: MasterId, b: MasterId) -> f64 {
        self.blend(
            self.collaborative.master_similarity(a, b),
            self.content.master_similarity(a, b),
        )
    }

    fn game_similarity(&self, a: GameId, b: GameId) -> f64 {
        self.blend(
            self.collaborative.game_similarity(a, b),
            self.content.game_similarity(a, b),
        )
    }

    fn update_user_features(&self, user_id: UserId) {
        self.collaborative.update_user_features(user_id);
        self.content.update_user_features(user_id);
    }

    fn update_master_features(&self, master_id: MasterId) {
        self.collaborative.update_master_features(master_id);
        self.content.update_master_features(master_id);
    }

    fn update_game_features(&self, game_id: GameId) {
        self.collaborative.update_game_features(game_id);
        self.content.update_game_features(game_id);
    }

    /// Both sub-models are built before either goes live
    fn prepare_training(&self) -> Result<PendingTraining<'_>> {
        let started = Instant::now();

        let (cf, cb) = rayon::join(
            || self.collaborative.prepare_training(),
            || self.content.prepare_training(),
        );
        let (cf, cb) = (cf?, cb?);

        let (cf_report, cb_report) = (cf.report(), cb.report());
        let report = TrainingReport {
            algorithm: self.kind(),
            generation: cf_report.generation.max(cb_report.generation),
            users: cf_report.users,
            masters: cf_report.masters,
            games: cf_report.games,
            similarity_pairs: cf_report.similarity_pairs + cb_report.similarity_pairs,
            elapsed_ms: started.elapsed().as_millis(),
            hybrid_weights: Some(self.weights()),
        };

        Ok(PendingTraining::new(report, move || {
            cf.commit();
            cb.commit();
        }))
    }

    #[instrument(skip(self))]
    fn train_model(&self) -> Result<TrainingReport> {
        let started = Instant::now();
        let mut report = self.prepare_training()?.commit();

        let (cf_metrics, cb_metrics) = rayon::join(
            || self.collaborative.evaluate_model(),
            || self.content.evaluate_model(),
        );
        let (cf_metrics, cb_metrics) = (cf_metrics?, cb_metrics?);

        let (cf_score, cb_score) = (cf_metrics.overall_score(), cb_metrics.overall_score());
        let weights = {
            let mut guard = self.weights.write();
            let next = guard.rebalanced(cf_score, cb_score);
            if next == *guard {
                warn!("Both strategies scored 0, keeping blend weights");
            }
            *guard = next;
            next
        };

        info!(
            collaborative = weights.collaborative,
            content = weights.content,
            version = weights.version,
            "Hybrid weights re-balanced"
        );

        report.hybrid_weights = Some(weights);
        report.elapsed_ms = started.elapsed().as_millis();
        Ok(report)
    }

    fn evaluate_model(&self) -> Result<RecommendMetrics> {
        let w = self.weights();
        let (cf, cb) = rayon::join(
            || self.collaborative.evaluate_model(),
            || self.content.evaluate_model(),
        );
        Ok(RecommendMetrics::blend(&cf?, w.collaborative, &cb?, w.content))
    }
}
