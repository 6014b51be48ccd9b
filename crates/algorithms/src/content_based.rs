//! Content-based matching over sparse tag-weight vectors.
//!
//! Users, masters and games are each described by a [`TagWeights`] map; all
//! similarities are sparse cosines between those maps. A user with no tags
//! matches nothing, so gets an empty list.

use crate::error::{AlgorithmError, Result};
use crate::evaluation::{EvaluationConfig, MetricsEvaluator};
use crate::metrics::RecommendMetrics;
use crate::tag_weight::{TagWeigher, TagWeights};
use crate::traits::{
    AlgorithmKind, MasterRanker, PendingTraining, RecommendAlgorithm, ScoredItem, TrainingReport,
    top_n,
};
use dashmap::DashMap;
use data_loader::{DataIndex, GameId, MasterId, UserId};
use parking_lot::RwLock;
use pipeline::{SimilarityCache, sparse_cosine};
use rayon::prelude::*;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// One generation of content-based state
pub struct CbModel {
    data: Arc<DataIndex>,
    weigher: TagWeigher,
    generation: u64,
    user_weights: DashMap<UserId, Arc<TagWeights>>,
    master_weights: DashMap<MasterId, Arc<TagWeights>>,
    game_weights: DashMap<GameId, Arc<TagWeights>>,
    master_pairs: SimilarityCache<MasterId>,
    game_pairs: SimilarityCache<GameId>,
}

fn cached<K: Copy + Eq + Hash>(
    map: &DashMap<K, Arc<TagWeights>>,
    id: K,
    compute: impl FnOnce(K) -> TagWeights,
) -> Arc<TagWeights> {
    map.entry(id).or_insert_with(|| Arc::new(compute(id))).clone()
}

impl CbModel {
    fn new(data: Arc<DataIndex>, generation: u64) -> Self {
        Self {
            weigher: TagWeigher::new(data.clone()),
            data,
            generation,
            user_weights: DashMap::new(),
            master_weights: DashMap::new(),
            game_weights: DashMap::new(),
            master_pairs: SimilarityCache::new(),
            game_pairs: SimilarityCache::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn user(&self, id: UserId) -> Arc<TagWeights> {
        cached(&self.user_weights, id, |id| self.weigher.user_weights(id))
    }

    fn master(&self, id: MasterId) -> Arc<TagWeights> {
        cached(&self.master_weights, id, |id| self.weigher.master_weights(id))
    }

    fn game(&self, id: GameId) -> Arc<TagWeights> {
        cached(&self.game_weights, id, |id| self.weigher.game_weights(id))
    }

    pub fn master_similarity(&self, a: MasterId, b: MasterId) -> f64 {
        self.master_pairs
            .get_or_compute(a, b, || sparse_cosine(&self.master(a), &self.master(b)))
    }

    pub fn game_similarity(&self, a: GameId, b: GameId) -> f64 {
        self.game_pairs
            .get_or_compute(a, b, || sparse_cosine(&self.game(a), &self.game(b)))
    }

    pub fn user_master_similarity(&self, user_id: UserId, master_id: MasterId) -> f64 {
        sparse_cosine(&self.user(user_id), &self.master(master_id))
    }

    pub fn user_game_similarity(&self, user_id: UserId, game_id: GameId) -> f64 {
        sparse_cosine(&self.user(user_id), &self.game(game_id))
    }

    pub fn recommend_masters(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
        limit: usize,
    ) -> Vec<ScoredItem<MasterId>> {
        if limit == 0 || self.user(user_id).is_empty() {
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
        if limit == 0 || self.user(user_id).is_empty() {
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

    fn build(&self) -> Result<usize> {
        let users = self.data.all_user_ids();
        let masters = self.data.all_master_ids();
        let games = self.data.all_game_ids();

        users.par_iter().for_each(|&u| {
            self.user(u);
        });
        masters.par_iter().for_each(|&m| {
            self.master(m);
        });
        games.par_iter().for_each(|&g| {
            self.game(g);
        });

        check_finite(&users, "user", |id| self.user(id))?;
        check_finite(&masters, "master", |id| self.master(id))?;
        check_finite(&games, "game", |id| self.game(id))?;

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

        Ok(self.master_pairs.len() + self.game_pairs.len())
    }

    /// Sorted cached master-pair similarities, for comparing generations
    pub fn master_pair_values(&self) -> Vec<f64> {
        let mut values = self.master_pairs.values();
        values.sort_by(f64::total_cmp);
        values
    }
}

fn check_finite(
    ids: &[u64],
    entity: &'static str,
    weights: impl Fn(u64) -> Arc<TagWeights>,
) -> Result<()> {
    match ids
        .iter()
        .find(|&&id| weights(id).values().any(|w| !w.is_finite()))
    {
        Some(&id) => Err(AlgorithmError::NonFiniteFeature { entity, id }),
        None => Ok(()),
    }
}

impl MasterRanker for CbModel {
    fn rank_masters(&self, user_id: UserId, k: usize) -> Vec<MasterId> {
        self.recommend_masters(user_id, None, k)
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    fn master_similarity(&self, a: MasterId, b: MasterId) -> f64 {
        CbModel::master_similarity(self, a, b)
    }
}

pub struct ContentBased {
    data: Arc<DataIndex>,
    evaluation: EvaluationConfig,
    model: RwLock<Arc<CbModel>>,
}

impl ContentBased {
    pub fn new(data: Arc<DataIndex>, evaluation: EvaluationConfig) -> Self {
        Self {
            model: RwLock::new(Arc::new(CbModel::new(data.clone(), 0))),
            data,
            evaluation,
        }
    }

    pub fn snapshot(&self) -> Arc<CbModel> {
        self.model.read().clone()
    }
}

impl RecommendAlgorithm for ContentBased {
    fn name(&self) -> &str {
        "content_based"
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::ContentBased
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
            .user_weights
            .insert(user_id, Arc::new(model.weigher.user_weights(user_id)));
    }

    fn update_master_features(&self, master_id: MasterId) {
        let model = self.snapshot();
        model
            .master_weights
            .insert(master_id, Arc::new(model.weigher.master_weights(master_id)));
        model.master_pairs.invalidate(master_id);
    }

    fn update_game_features(&self, game_id: GameId) {
        let model = self.snapshot();
        model
            .game_weights
            .insert(game_id, Arc::new(model.weigher.game_weights(game_id)));
        model.game_pairs.invalidate(game_id);
    }

    #[instrument(skip(self))]
    fn prepare_training(&self) -> Result<PendingTraining<'_>> {
        let started = Instant::now();
        let generation = self.snapshot().generation + 1;

        let model = CbModel::new(self.data.clone(), generation);
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
            "Content-based model trained"
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
