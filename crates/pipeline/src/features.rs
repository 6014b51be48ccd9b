//! Feature extraction for ranking and similarity.
//!
//! Two kinds of output:
//! - Fixed-order numeric vectors per master and per game, each component
//!   normalized to [0, 1], used for cosine similarity
//! - `RankingFeatures` per (candidate, requester) pair, consumed by RankService
//!
//! Everything here is a pure function of the DataIndex and its `as_of` instant.
//! A missing entity or field maps to a neutral value, never to an error.

use data_loader::{DataIndex, GameId, GameMaster, MasterId};
use rayon::prelude::*;
use sources::{Candidate, UserContext};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Length of a master feature vector
pub const MASTER_VECTOR_LEN: usize = 8;

/// Length of a game feature vector
pub const GAME_VECTOR_LEN: usize = 5;

// Saturation points for the vector components
const VECTOR_ORDER_SATURATION: f64 = 200.0;
const VECTOR_PRICE_SATURATION: f64 = 500.0;
const VECTOR_COUNT_SATURATION: f64 = 10.0;
const ACCOUNT_AGE_SATURATION_DAYS: f64 = 365.0;
const RECENCY_DECAY_DAYS: f64 = 30.0;
const GAME_MASTER_SATURATION: f64 = 50.0;

/// Features for one candidate master as seen by one requester.
///
/// Produced once per request, consumed once by RankService, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingFeatures {
    pub master_id: MasterId,

    // Relevance
    /// Jaccard similarity of user and master tag names
    pub tag_similarity: f64,
    /// Fraction of the user's game types the master plays
    pub game_type_match: f64,
    /// 1.0 same region, 0.0 different, 0.5 unknown
    pub region_match: f64,
    /// 1.0 same age, falling to 0.0 at 20 years apart, 0.5 unknown
    pub age_match: f64,

    // Quality
    pub rating: f64,
    pub completion_rate: f64,
    /// Service quality estimate from rating and order volume
    pub quality: f64,

    // Diversity
    pub category_count: usize,
    pub feature_diversity: f64,
    pub novelty: f64,

    // Popularity
    pub order_count: u32,
    pub view_count: f64,
    pub like_count: f64,

    /// Mid-band price curve around 125
    pub price_score: f64,

    // Time
    pub time_decay: f64,
    pub is_online: bool,

    /// Free-form extras (availability, price_ratio, price_reasonable)
    pub extensions: BTreeMap<String, f64>,
}

impl RankingFeatures {
    /// Neutral features for a candidate that could not be resolved
    pub fn new(master_id: MasterId) -> Self {
        Self {
            master_id,
            tag_similarity: 0.0,
            game_type_match: 0.0,
            region_match: 0.0,
            age_match: 0.0,
            rating: 0.0,
            completion_rate: 0.0,
            quality: 0.0,
            category_count: 0,
            feature_diversity: 0.0,
            novelty: 0.0,
            order_count: 0,
            view_count: 0.0,
            like_count: 0.0,
            price_score: 0.0,
            time_decay: 0.0,
            is_online: false,
            extensions: BTreeMap::new(),
        }
    }
}

/// Computes feature vectors and ranking features.
///
/// Cheap to clone: only holds the shared DataIndex.
#[derive(Clone)]
pub struct FeatureExtractor {
    data_index: Arc<DataIndex>,
}

impl FeatureExtractor {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        Self { data_index }
    }

    pub fn data_index(&self) -> &Arc<DataIndex> {
        &self.data_index
    }

    // =========================================================================
    // Similarity vectors
    // =========================================================================

    /// Master vector: rating, orders, price, online, game types, tags,
    /// account age, recency of update. All zeros for an unknown master.
    pub fn master_vector(&self, master_id: MasterId) -> Vec<f64> {
        let Some(master) = self.data_index.get_master(master_id) else {
            return vec![0.0; MASTER_VECTOR_LEN];
        };

        let account_age = master
            .created_at
            .map(|t| saturate(self.data_index.days_since(t), ACCOUNT_AGE_SATURATION_DAYS))
            .unwrap_or(0.0);
        let recency = master
            .updated_at
            .map(|t| (-self.data_index.days_since(t) / RECENCY_DECAY_DAYS).exp())
            .unwrap_or(0.0);

        vec![
            unit(master.score.unwrap_or(0.0) / 5.0),
            saturate(master.order_count as f64, VECTOR_ORDER_SATURATION),
            saturate(master.price.unwrap_or(0.0), VECTOR_PRICE_SATURATION),
            if master.is_online() { 1.0 } else { 0.0 },
            saturate(master.game_types.len() as f64, VECTOR_COUNT_SATURATION),
            saturate(master.tags.len() as f64, VECTOR_COUNT_SATURATION),
            account_age,
            recency,
        ]
    }

    /// Game vector: order volume, mean order rating, master supply, tags,
    /// recency of update. All zeros for an unknown game.
    pub fn game_vector(&self, game_id: GameId) -> Vec<f64> {
        let Some(game) = self.data_index.get_game(game_id) else {
            return vec![0.0; GAME_VECTOR_LEN];
        };

        let orders = self.data_index.get_game_orders(game_id);
        let ratings: Vec<f64> = orders.iter().filter_map(|o| o.rating).collect();
        let mean_rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().sum::<f64>() / ratings.len() as f64
        };
        let recency = game
            .updated_at
            .or(game.created_at)
            .map(|t| (-self.data_index.days_since(t) / RECENCY_DECAY_DAYS).exp())
            .unwrap_or(0.0);

        vec![
            saturate(orders.len() as f64, VECTOR_ORDER_SATURATION),
            unit(mean_rating / 5.0),
            saturate(
                self.data_index.get_masters_for_game(game_id).len() as f64,
                GAME_MASTER_SATURATION,
            ),
            saturate(
                self.data_index.get_game_tags(game_id).len() as f64,
                VECTOR_COUNT_SATURATION,
            ),
            recency,
        ]
    }

    // =========================================================================
    // Ranking features
    // =========================================================================

    /// Compute ranking features for all candidates in parallel.
    ///
    /// Output is in candidate order, one entry per candidate.
    pub fn compute_features(
        &self,
        candidates: &[Candidate],
        context: &UserContext,
    ) -> Vec<RankingFeatures> {
        candidates
            .par_iter()
            .map(|candidate| match self.data_index.get_master(candidate.master_id) {
                Some(master) => self.ranking_features(master, context),
                None => RankingFeatures::new(candidate.master_id),
            })
            .collect()
    }

    pub fn ranking_features(&self, master: &GameMaster, context: &UserContext) -> RankingFeatures {
        let mut features = RankingFeatures::new(master.id);

        features.tag_similarity = jaccard(&context.tags, &master.tags);
        features.game_type_match = match_ratio(&context.game_types, &master.game_types);
        features.region_match = match (context.region.as_deref(), master.region.as_deref()) {
            (Some(a), Some(b)) if a == b => 1.0,
            (Some(_), Some(_)) => 0.0,
            _ => 0.5,
        };
        features.age_match = match (context.age, master.age) {
            (Some(a), Some(b)) => (1.0 - (a as f64 - b as f64).abs() / 20.0).max(0.0),
            _ => 0.5,
        };

        features.rating = master.score.unwrap_or(0.0);
        features.completion_rate = completion_rate(master);
        features.quality = quality(master);

        features.category_count = master.game_types.len().max(1);
        features.feature_diversity = if master.game_types.is_empty() {
            0.3
        } else {
            (master.game_types.len() as f64 / 10.0).min(1.0)
        };
        features.novelty = self.novelty(master);

        features.order_count = master.order_count;
        let orders = master.order_count as f64;
        let score = master.score.unwrap_or(0.0);
        features.view_count = orders * 10.0 + score * 200.0;
        features.like_count = score * 20.0 + orders * 0.8;

        features.price_score = price_score(master.price);

        features.time_decay = self.time_decay(master);
        features.is_online = master.is_online();

        let availability = (if features.is_online { 0.6 } else { 0.2 }) + features.time_decay * 0.4;
        features
            .extensions
            .insert("availability".to_string(), availability.min(1.0));
        let price_ratio = match (master.price, master.score) {
            (Some(price), Some(score)) if price > 0.0 => (score / price * 50.0).min(1.0),
            _ => 0.5,
        };
        features
            .extensions
            .insert("price_ratio".to_string(), price_ratio);
        let reasonable = match (master.price, master.score) {
            (Some(price), Some(score)) => price >= score * 20.0 && price <= score * 60.0,
            _ => true,
        };
        features
            .extensions
            .insert("price_reasonable".to_string(), if reasonable { 1.0 } else { 0.0 });

        features
    }

    /// Newly created masters are novel for 30 days
    fn novelty(&self, master: &GameMaster) -> f64 {
        match master.created_at {
            Some(created) => {
                let days = self.data_index.days_since(created);
                if days <= 30.0 {
                    (1.0 - days / 30.0).max(0.3)
                } else {
                    0.2
                }
            }
            None => 0.2,
        }
    }

    /// Full marks within a day of activity, 0.5 after a week, floor of 0.1
    fn time_decay(&self, master: &GameMaster) -> f64 {
        let Some(updated) = master.updated_at else {
            return 0.5;
        };
        let hours = self.data_index.hours_since(updated).floor();
        if hours <= 24.0 {
            1.0
        } else if hours <= 168.0 {
            1.0 - (hours - 24.0) / 144.0 * 0.5
        } else {
            (0.5 - (hours - 168.0) / 720.0 * 0.4).max(0.1)
        }
    }
}

/// Mid-range prices score best; cheap and expensive sessions fall off
fn price_score(price: Option<f64>) -> f64 {
    match price {
        Some(p) if (50.0..=200.0).contains(&p) => 1.0 - (p - 125.0).abs() / 125.0,
        Some(p) if p < 50.0 => 0.3 + p / 50.0 * 0.4,
        Some(p) => (1.0 - (p - 200.0) / 300.0).max(0.1),
        None => 0.5,
    }
}

fn completion_rate(master: &GameMaster) -> f64 {
    if master.order_count == 0 {
        return 0.5;
    }
    match master.score {
        Some(score) => (score / 5.0 * 1.1).min(1.0),
        None => 0.8,
    }
}

fn quality(master: &GameMaster) -> f64 {
    match master.score {
        Some(score) => score / 5.0 * 0.6 + (master.order_count as f64 / 100.0).min(1.0) * 0.4,
        None => 0.5,
    }
}

/// |a ∩ b| / |a ∪ b| over distinct entries, 0 when either side is empty
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Fraction of `wanted` present in `offered`
fn match_ratio(wanted: &[String], offered: &[String]) -> f64 {
    if wanted.is_empty() || offered.is_empty() {
        return 0.0;
    }
    wanted.iter().filter(|x| offered.contains(x)).count() as f64 / wanted.len() as f64
}

/// Cap at `saturation` and scale to [0, 1]
fn saturate(value: f64, saturation: f64) -> f64 {
    unit(value.min(saturation) / saturation)
}

/// Clamp into [0, 1]. NaN is passed through so callers can detect it.
fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use data_loader::{Game, MasterStatus};

    fn base_master(id: MasterId) -> GameMaster {
        GameMaster {
            id,
            nickname: format!("m{}", id),
            gender: None,
            age: Some(25),
            region: Some("north".to_string()),
            level: None,
            score: Some(4.0),
            order_count: 100,
            status: MasterStatus::Online,
            price: Some(125.0),
            game_types: vec!["moba".to_string(), "fps".to_string()],
            games: vec![],
            tags: vec!["carry".to_string(), "chill".to_string()],
            created_at: None,
            updated_at: None,
        }
    }

    fn create_test_index() -> DataIndex {
        let mut index = DataIndex::new();
        index.set_as_of(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        index.insert_master(base_master(1));
        index
    }

    #[test]
    fn test_master_vector_shape_and_range() {
        let extractor = FeatureExtractor::new(Arc::new(create_test_index()));
        let vector = extractor.master_vector(1);

        assert_eq!(vector.len(), MASTER_VECTOR_LEN);
        assert!(vector.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((vector[0] - 0.8).abs() < 1e-12);
        assert!((vector[1] - 0.5).abs() < 1e-12);
        assert_eq!(vector[3], 1.0);
    }

    #[test]
    fn test_unknown_entities_are_zero_vectors() {
        let extractor = FeatureExtractor::new(Arc::new(create_test_index()));
        assert_eq!(extractor.master_vector(999), vec![0.0; MASTER_VECTOR_LEN]);
        assert_eq!(extractor.game_vector(999), vec![0.0; GAME_VECTOR_LEN]);
    }

    #[test]
    fn test_vectors_are_deterministic() {
        let extractor = FeatureExtractor::new(Arc::new(create_test_index()));
        assert_eq!(extractor.master_vector(1), extractor.master_vector(1));
    }

    #[test]
    fn test_game_vector() {
        let mut index = create_test_index();
        index.insert_game(Game {
            id: 7,
            name: "Arena".to_string(),
            game_type: "moba".to_string(),
            created_at: None,
            updated_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        });
        let extractor = FeatureExtractor::new(Arc::new(index));
        let vector = extractor.game_vector(7);

        assert_eq!(vector.len(), GAME_VECTOR_LEN);
        // Updated exactly at as_of
        assert!((vector[4] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ranking_features_relevance() {
        let index = Arc::new(create_test_index());
        let extractor = FeatureExtractor::new(index.clone());

        let mut context = UserContext::new(1);
        context.tags = vec!["carry".to_string()];
        context.game_types = vec!["moba".to_string(), "rpg".to_string()];
        context.region = Some("north".to_string());
        context.age = Some(35);

        let features = extractor.ranking_features(index.get_master(1).unwrap(), &context);
        assert!((features.tag_similarity - 0.5).abs() < 1e-12);
        assert!((features.game_type_match - 0.5).abs() < 1e-12);
        assert_eq!(features.region_match, 1.0);
        assert!((features.age_match - 0.5).abs() < 1e-12);
        assert_eq!(features.view_count, 100.0 * 10.0 + 4.0 * 200.0);
        assert_eq!(features.price_score, 1.0);
    }

    #[test]
    fn test_unknown_profile_fields_are_neutral() {
        let index = Arc::new(create_test_index());
        let extractor = FeatureExtractor::new(index.clone());

        let features = extractor.ranking_features(index.get_master(1).unwrap(), &UserContext::new(2));
        assert_eq!(features.region_match, 0.5);
        assert_eq!(features.age_match, 0.5);
        assert_eq!(features.tag_similarity, 0.0);
        assert_eq!(features.novelty, 0.2);
        assert_eq!(features.time_decay, 0.5);
    }

    #[test]
    fn test_time_decay_and_novelty_follow_as_of() {
        let mut index = create_test_index();
        let as_of = index.as_of();
        let mut master = base_master(2);
        master.created_at = Some(as_of - Duration::days(15));
        master.updated_at = Some(as_of - Duration::hours(96));
        index.insert_master(master);
        let index = Arc::new(index);
        let extractor = FeatureExtractor::new(index.clone());

        let features = extractor.ranking_features(index.get_master(2).unwrap(), &UserContext::new(1));
        assert!((features.novelty - 0.5).abs() < 1e-12);
        assert!((features.time_decay - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_compute_features_keeps_order_and_handles_missing() {
        let extractor = FeatureExtractor::new(Arc::new(create_test_index()));
        let candidates = vec![
            Candidate::new(999, sources::CandidateSource::Popularity, 0.5),
            Candidate::new(1, sources::CandidateSource::Popularity, 0.5),
        ];

        let features = extractor.compute_features(&candidates, &UserContext::new(1));
        assert_eq!(features.len(), 2);
        assert_eq!(features[0], RankingFeatures::new(999));
        assert_eq!(features[1].master_id, 1);
    }

    #[test]
    fn test_jaccard_ignores_duplicates() {
        let doubled = vec!["x".to_string(), "x".to_string()];
        let single = vec!["x".to_string()];
        assert_eq!(jaccard(&doubled, &single), 1.0);

        let mixed = vec!["x".to_string(), "x".to_string(), "y".to_string()];
        assert!((jaccard(&mixed, &single) - 0.5).abs() < 1e-12);
        assert_eq!(jaccard(&[], &single), 0.0);
    }

    #[test]
    fn test_price_score_curve() {
        assert_eq!(price_score(None), 0.5);
        assert!((price_score(Some(25.0)) - 0.5).abs() < 1e-12);
        assert!((price_score(Some(50.0)) - 0.4).abs() < 1e-12);
        assert_eq!(price_score(Some(2_000.0)), 0.1);
    }
}
