//! Collaborative filtering over implicit ratings.
//!
//! ## Algorithm
//! - Each user's history is the masters (and games) they interacted with,
//!   with an implicit rating estimate, in first-interaction order
//! - Master and game similarity is the cosine of their feature vectors
//! - A user's affinity for an item is the mean similarity of that item to
//!   every item in their history, 0.0 when the history is empty
//!
//! ## Generations
//! All caches live in one [`CfModel`] behind `RwLock<Arc<_>>`. Requests clone
//! the `Arc` and never block on training; `train_model` fills a fresh model
//! completely, validates it, and only then swaps it in.

use crate::error::{AlgorithmError, Result};
use crate::evaluation::{EvaluationConfig, MetricsEvaluator};
use crate::metrics::RecommendMetrics;
use crate::rating::{game_ratings, master_ratings};
use crate::traits::{
    AlgorithmKind, MasterRanker, PendingTraining, RecommendAlgorithm, ScoredItem, TrainingReport,
    top_n,
};
use dashmap::DashMap;
use data_loader::{DataIndex, GameId, MasterId, UserId};
use parking_lot::RwLock;
use pipeline::{FeatureExtractor, SimilarityEngine};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

type History = Arc<Vec<(u64, f64)>>;

/// One generation of collaborative-filtering state
pub struct CfModel {
    data: Arc<DataIndex>,
    extractor: FeatureExtractor,
    generation: u64,
    master_history: DashMap<UserId, History>,
    game_history: DashMap<UserId, History>,
    masters: SimilarityEngine<MasterId>,
    games: SimilarityEngine<GameId>,
}

impl CfModel {
    fn new(data: Arc<DataIndex>, generation: u64) -> Self {
        Self {
            extractor: FeatureExtractor::new(data.clone()),
            data,
            generation,
            master_history: DashMap::new(),
            game_history: DashMap::new(),
            masters: SimilarityEngine::new(),
            games: SimilarityEngine::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn master_history(&self, user_id: UserId) -> History {
        self.master_history
            .entry(user_id)
            .or_insert_with(|| Arc::new(master_ratings(&self.data, user_id)))
            .clone()
    }

    fn game_history(&self, user_id: UserId) -> History {
        self.game_history
            .entry(user_id)
            .or_insert_with(|| Arc::new(game_ratings(&self.data, user_id)))
            .clone()
    }

    pub fn master_similarity(&self, a: MasterId, b: MasterId) -> f64 {
        self.masters
            .similarity(a, b, &|id| self.extractor.master_vector(id))
    }

    pub fn game_similarity(&self, a: GameId, b: GameId) -> f64 {
        self.games.similarity(a, b, &|id| self.extractor.game_vector(id))
    }

    pub fn user_master_similarity(&self, user_id: UserId, master_id: MasterId) -> f64 {
        mean_similarity(&self.master_history(user_id), |h| self.master_similarity(h, master_id))
    }

    pub fn user_game_similarity(&self, user_id: UserId, game_id: GameId) -> f64 {
        mean_similarity(&self.game_history(user_id), |h| self.game_similarity(h, game_id))
    }

    pub fn recommend_masters(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
        limit: usize,
    ) -> Vec<ScoredItem<MasterId>> {
        if limit == 0 || self.master_history(user_id).is_empty() {
            return Vec::new();
        }
        let candidates = match game_id {
            Some(game_id) => self.data.get_masters_for_game(game_id).to_vec(),
            None => self.data.all_master_ids(),
        };
        let scored = candidates
            .par_iter()
            .map(|&m| ScoredItem::new(m, self.user_master_similarity(user_id, m)))
            .collect();
        top_n(scored, limit)
    }

    pub fn recommend_games(&self, user_id: UserId, limit: usize) -> Vec<ScoredItem<GameId>> {
        if limit == 0 || self.game_history(user_id).is_empty() {
            return Vec::new();
        }
        let scored = self
            .data
            .all_game_ids()
            .par_iter()
            .map(|&g| ScoredItem::new(g, self.user_game_similarity(user_id, g)))
            .collect();
        top_n(scored, limit)
    }

    /// Populate every cache, then check that nothing non-finite slipped in
    fn build(&self) -> Result<usize> {
        let users = self.data.all_user_ids();
        let masters = self.data.all_master_ids();
        let games = self.data.all_game_ids();

        users.par_iter().for_each(|&u| {
            self.master_history(u);
            self.game_history(u);
        });
        for (user_id, history, entity) in users.iter().flat_map(|&u| {
            [
                (u, self.master_history(u), "master"),
                (u, self.game_history(u), "game"),
            ]
        }) {
            if let Some(&(id, _)) = history.iter().find(|(_, r)| !r.is_finite()) {
                return Err(AlgorithmError::NonFiniteRating {
                    user_id,
                    entity,
                    id,
                });
            }
        }

        // Vectors are checked before pairs: cosine maps NaN to 0.0
        let master_vectors: Vec<(MasterId, Vec<f64>)> = masters
            .par_iter()
            .map(|&m| (m, self.masters.vector(m, &|id| self.extractor.master_vector(id))))
            .collect();
        if let Some((id, _)) = master_vectors.iter().find(|(_, v)| v.iter().any(|x| !x.is_finite())) {
            return Err(AlgorithmError::NonFiniteFeature { entity: "master", id: *id });
        }
        let game_vectors: Vec<(GameId, Vec<f64>)> = games
            .par_iter()
            .map(|&g| (g, self.games.vector(g, &|id| self.extractor.game_vector(id))))
            .collect();
        if let Some((id, _)) = game_vectors.iter().find(|(_, v)| v.iter().any(|x| !x.is_finite())) {
            return Err(AlgorithmError::NonFiniteFeature { entity: "game", id: *id });
        }

        (0..masters.len()).into_par_iter().for_each(|i| {
            for &b in &masters[i + 1..] {
                self.master_similarity(masters[i], b);
            }
        });
        (0..games.len()).into_par_iter().for_each(|i| {
            for &b in &games[i + 1..] {
                self.game_similarity(games[i], b);
            }
        });

        Ok(self.masters.pairs().len() + self.games.pairs().len())
    }

    /// Sorted cached master-pair similarities, for comparing generations
    pub fn master_pair_values(&self) -> Vec<f64> {
        let mut values = self.masters.pairs().values();
        values.sort_by(f64::total_cmp);
        values
    }
}

impl MasterRanker for CfModel {
    fn rank_masters(&self, user_id: UserId, k: usize) -> Vec<MasterId> {
        self.recommend_masters(user_id, None, k)
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    fn master_similarity(&self, a: MasterId, b: MasterId) -> f64 {
        CfModel::master_similarity(self, a, b)
    }
}

fn mean_similarity(history: &[(u64, f64)], similarity: impl Fn(u64) -> f64) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    history.iter().map(|&(id, _)| similarity(id)).sum::<f64>() / history.len() as f64
}

pub struct CollaborativeFiltering {
    data: Arc<DataIndex>,
    evaluation: EvaluationConfig,
    model: RwLock<Arc<CfModel>>,
}

impl CollaborativeFiltering {
    pub fn new(data: Arc<DataIndex>, evaluation: EvaluationConfig) -> Self {
        Self {
            model: RwLock::new(Arc::new(CfModel::new(data.clone(), 0))),
            data,
            evaluation,
        }
    }

    /// The live generation; holds no lock once returned
    pub fn snapshot(&self) -> Arc<CfModel> {
        self.model.read().clone()
    }
}

impl RecommendAlgorithm for CollaborativeFiltering {
    fn name(&self) -> &str {
        "collaborative_filtering"
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Collaborative
    }

    fn recommend_masters(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
        limit: usize,
    ) -> Vec<ScoredItem<MasterId>> {
        self.snapshot().recommend_masters(user_id, game_id, limit)
    }

    fn recommend_games(&self, user_id: UserId, limit: usize) -> Vec<ScoredItem<GameId>> {
        self.snapshot().recommend_games(user_id, limit)
    }

    fn user_master_similarity(&self, user_id: UserId, master_id: MasterId) -> f64 {
        self.snapshot().user_master_similarity(user_id, master_id)
    }

    fn user_game_similarity(&self, user_id: UserId, game_id: GameId) -> f64 {
        self.snapshot().user_game_similarity(user_id, game_id)
    }

    fn master_similarity(&self, a: MasterId, b: MasterId) -> f64 {
        self.snapshot().master_similarity(a, b)
    }

    fn game_similarity(&self, a: GameId, b: GameId) -> f64 {
        self.snapshot().game_similarity(a, b)
    }

    fn update_user_features(&self, user_id: UserId) {
        let model = self.snapshot();
        model
            .master_history
            .insert(user_id, Arc::new(master_ratings(&model.data, user_id)));
        model
            .game_history
            .insert(user_id, Arc::new(game_ratings(&model.data, user_id)));
    }

    fn update_master_features(&self, master_id: MasterId) {
        self.snapshot().masters.invalidate(master_id);
    }

    fn update_game_features(&self, game_id: GameId) {
        self.snapshot().games.invalidate(game_id);
    }

    #[instrument(skip(self))]
    fn prepare_training(&self) -> Result<PendingTraining<'_>> {
        let started = Instant::now();
        let generation = self.snapshot().generation + 1;

        let model = CfModel::new(self.data.clone(), generation);
        let similarity_pairs = model.build()?;

        let counts = self.data.counts();
        let report = TrainingReport {
            algorithm: self.kind(),
            generation,
            users: counts.users,
            masters: counts.masters,
            games: counts.games,
            similarity_pairs,
            elapsed_ms: started.elapsed().as_millis(),
            hybrid_weights: None,
        };
        info!(
            generation,
            similarity_pairs,
            elapsed_ms = report.elapsed_ms as u64,
            "Collaborative filtering model trained"
        );

        Ok(PendingTraining::new(report, move || {
            *self.model.write() = Arc::new(model);
        }))
    }

    fn evaluate_model(&self) -> Result<RecommendMetrics> {
        let model = self.snapshot();
        MetricsEvaluator::new(self.data.clone(), self.evaluation.clone()).evaluate(&*model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{at, build_index, master, order};
    use data_loader::{DataIndex, MasterGame};

    fn trained(index: DataIndex) -> CollaborativeFiltering {
        let cf = CollaborativeFiltering::new(Arc::new(index), EvaluationConfig::default());
        cf.train_model().unwrap();
        cf
    }

    fn sample_index() -> DataIndex {
        let mut index = build_index();
        index.insert_master(master(1, 4.8, 120));
        index.insert_master(master(2, 4.7, 110));
        index.insert_master(master(3, 1.0, 2));
        order(&mut index, 1, 1, 1, Some(5.0), at(1));
        index.build_secondary_indices();
        index
    }

    #[test]
    fn test_empty_history_gives_empty_list() {
        let cf = trained(sample_index());
        assert!(cf.recommend_masters(99, None, 10).is_empty());
        assert_eq!(cf.user_master_similarity(99, 1), 0.0);
        assert!(cf.recommend_games(99, 10).is_empty());
    }

    #[test]
    fn test_identical_masters_are_fully_similar() {
        let mut index = sample_index();
        index.insert_master(master(4, 4.8, 120));
        let cf = CollaborativeFiltering::new(Arc::new(index), EvaluationConfig::default());

        assert_eq!(cf.master_similarity(1, 4), 1.0);
        assert_eq!(cf.master_similarity(1, 1), 1.0);
    }

    #[test]
    fn test_similarity_is_symmetric_and_bounded() {
        let cf = trained(sample_index());
        for a in 1..=3 {
            for b in 1..=3 {
                let s = cf.master_similarity(a, b);
                assert_eq!(s, cf.master_similarity(b, a));
                assert!((0.0..=1.0).contains(&s));
            }
        }
        // Unknown master has a zero vector
        assert_eq!(cf.master_similarity(1, 999), 0.0);
    }

    #[test]
    fn test_recommendations_respect_limit_and_game() {
        let mut index = sample_index();
        let mut plays = master(5, 4.8, 100);
        plays.games = vec![MasterGame {
            game_id: 9,
            game_type: None,
            proficiency: None,
        }];
        index.insert_master(plays);
        index.build_secondary_indices();
        let cf = trained(index);

        let top = cf.recommend_masters(1, None, 2);
        assert_eq!(top.len(), 2);
        assert_ne!(top[0].id, top[1].id);
        assert!(top[0].score >= top[1].score);
        // The ordered master is most similar to the user's own history
        assert_eq!(top[0].id, 1);

        let for_game = cf.recommend_masters(1, Some(9), 10);
        assert_eq!(for_game.iter().map(|i| i.id).collect::<Vec<_>>(), vec![5]);
        assert!(cf.recommend_masters(1, None, 0).is_empty());
    }

    #[test]
    fn test_training_is_idempotent() {
        let cf = trained(sample_index());
        let first = cf.snapshot().master_pair_values();
        cf.train_model().unwrap();
        let second = cf.snapshot();

        assert_eq!(first, second.master_pair_values());
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_failed_training_keeps_previous_generation() {
        let mut index = sample_index();
        let mut broken = master(6, 4.0, 10);
        broken.score = Some(f64::NAN);
        index.insert_master(broken);
        let cf = CollaborativeFiltering::new(Arc::new(index), EvaluationConfig::default());
        let before = cf.snapshot();

        let err = cf.train_model().unwrap_err();
        assert_eq!(err, AlgorithmError::NonFiniteFeature { entity: "master", id: 6 });
        assert!(Arc::ptr_eq(&before, &cf.snapshot()));
    }

    #[test]
    fn test_update_master_features_drops_its_pairs() {
        let cf = trained(sample_index());
        let model = cf.snapshot();
        assert_eq!(model.masters.pairs().len(), 3);

        cf.update_master_features(1);
        assert_eq!(model.masters.pairs().len(), 1);
        // Recomputed on demand, same value as before
        assert_eq!(cf.master_similarity(1, 2), cf.master_similarity(2, 1));
    }

    #[test]
    fn test_update_user_features_refreshes_history() {
        let cf = CollaborativeFiltering::new(Arc::new(sample_index()), EvaluationConfig::default());
        cf.update_user_features(1);
        let model = cf.snapshot();
        assert!(model.master_history.contains_key(&1));
        assert_eq!(model.master_history(1).len(), 1);
    }

    #[test]
    fn test_evaluate_model_is_bounded() {
        let cf = trained(sample_index());
        let metrics = cf.evaluate_model().unwrap();
        for value in [metrics.precision(), metrics.recall(), metrics.coverage(), metrics.ndcg()] {
            assert!((0.0..=1.0).contains(&value));
        }
    }
}
