//! MetricsEvaluator: offline evaluation of a ranker against order history.
//!
//! ## Protocol
//! 1. Pick test users: an explicit list, or a seeded shuffle taking
//!    `test_ratio` of all users (at least one)
//! 2. Ask the ranker for each user's top K masters
//! 3. Compare with ground truth: masters the user ordered from with a rating
//!    of at least 4 (or no rating), plus `order` behaviors on masters
//!
//! ## Definitions
//! - Precision = hits / list length; Recall = hits / |ground truth|
//! - NDCG gain `2^r − 1`, discount `log2(rank + 1)`
//! - Diversity = 1 − mean pairwise similarity within a list (lists of 2+)
//! - Novelty = share of list items the user never interacted with
//! - Timeliness = mean of `exp(−days since last order / half life)`
//! - Cold start = precision over users with few behaviors
//!
//! Every empty denominator yields 0.0.

use crate::error::{AlgorithmError, Result};
use crate::metrics::{MetricValues, RecommendMetrics};
use crate::traits::MasterRanker;
use data_loader::{BehaviorKind, DataIndex, MasterId, TargetKind, UserId};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

const POSITIVE_RATING: f64 = 4.0;
const UNRATED_GAIN: f64 = 1.0;

/// The `[evaluation]` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// List length evaluated per user
    pub k: usize,
    /// Share of users drawn into the test set
    pub test_ratio: f64,
    pub seed: u64,
    /// Users with fewer behaviors count as cold
    pub cold_user_behaviors: usize,
    /// Masters with fewer orders count as cold
    pub cold_item_orders: u32,
    pub timeliness_half_life_days: f64,
    /// Evaluate exactly these users instead of sampling
    pub test_users: Option<Vec<UserId>>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            k: 10,
            test_ratio: 0.2,
            seed: 42,
            cold_user_behaviors: 5,
            cold_item_orders: 10,
            timeliness_half_life_days: 7.0,
            test_users: None,
        }
    }
}

/// Per-user accuracy numbers, present only for users with ground truth
#[derive(Debug, Clone, Copy, Default)]
struct Accuracy {
    precision: f64,
    recall: f64,
    mrr: f64,
    ndcg: f64,
}

#[derive(Clone)]
pub struct MetricsEvaluator {
    data: Arc<DataIndex>,
    config: EvaluationConfig,
}

impl MetricsEvaluator {
    pub fn new(data: Arc<DataIndex>, config: EvaluationConfig) -> Self {
        Self { data, config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Test users in ascending ID order
    pub fn select_test_users(&self) -> Vec<UserId> {
        if let Some(users) = &self.config.test_users {
            let mut users = users.clone();
            users.sort_unstable();
            users.dedup();
            return users;
        }

        let mut users = self.data.all_user_ids();
        if users.is_empty() {
            return users;
        }
        let take = ((users.len() as f64 * self.config.test_ratio).ceil() as usize).clamp(1, users.len());

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        users.shuffle(&mut rng);
        users.truncate(take);
        users.sort_unstable();
        users
    }

    /// Masters the user demonstrably liked, with a graded rating each
    pub fn ground_truth(&self, user_id: UserId) -> HashMap<MasterId, f64> {
        let mut truth: HashMap<MasterId, f64> = HashMap::new();
        for order in self.data.get_user_orders(user_id) {
            let positive = order.rating.is_none_or(|r| r >= POSITIVE_RATING);
            if positive {
                let gain = order.rating.unwrap_or(UNRATED_GAIN);
                let entry = truth.entry(order.master_id).or_insert(gain);
                if gain > *entry {
                    *entry = gain;
                }
            }
        }
        for behavior in self.data.get_user_behaviors(user_id) {
            if behavior.kind == BehaviorKind::Order && behavior.target == TargetKind::Master {
                truth.entry(behavior.target_id).or_insert(UNRATED_GAIN);
            }
        }
        truth
    }

    /// Evaluate a ranker over the selected test users
    pub fn evaluate(&self, ranker: &dyn MasterRanker) -> Result<RecommendMetrics> {
        let users = self.select_test_users();
        let k = self.config.k;
        let lists: Vec<(UserId, Vec<MasterId>)> = users
            .par_iter()
            .map(|&user_id| {
                let mut list = ranker.rank_masters(user_id, k);
                list.truncate(k);
                (user_id, list)
            })
            .collect();

        self.evaluate_lists(&lists, &|a, b| ranker.master_similarity(a, b))
    }

    /// Evaluate precomputed lists; `similarity` drives the diversity metric
    pub fn evaluate_lists(
        &self,
        lists: &[(UserId, Vec<MasterId>)],
        similarity: &(dyn Fn(MasterId, MasterId) -> f64 + Sync),
    ) -> Result<RecommendMetrics> {
        let mut accuracy = Vec::new();
        let mut cold_precision = Vec::new();
        let mut diversity = Vec::new();
        let mut novelty = Vec::new();
        let mut timeliness = Vec::new();
        let mut recommended: HashSet<MasterId> = HashSet::new();
        let (mut cold_items, mut total_items) = (0usize, 0usize);

        for (user_id, list) in lists {
            recommended.extend(list.iter().copied());
            total_items += list.len();
            cold_items += list.iter().filter(|&&m| self.is_cold_item(m)).count();

            let truth = self.ground_truth(*user_id);
            if !truth.is_empty() {
                let user_accuracy = accuracy_for(list, &truth);
                if self.data.get_user_behaviors(*user_id).len() < self.config.cold_user_behaviors {
                    cold_precision.push(user_accuracy.precision);
                }
                accuracy.push(user_accuracy);
            }

            if list.len() >= 2 {
                diversity.push(1.0 - mean_pairwise(list, similarity));
            }
            if !list.is_empty() {
                novelty.push(self.novelty(*user_id, list));
                timeliness.push(self.timeliness(list));
            }
        }

        let total_masters = self.data.all_master_ids().len();
        let values = MetricValues {
            precision: mean(accuracy.iter().map(|a| a.precision)),
            recall: mean(accuracy.iter().map(|a| a.recall)),
            mrr: mean(accuracy.iter().map(|a| a.mrr)),
            ndcg: mean(accuracy.iter().map(|a| a.ndcg)),
            coverage: ratio(recommended.len(), total_masters),
            diversity: mean(diversity.into_iter()),
            novelty: mean(novelty.into_iter()),
            timeliness: mean(timeliness.into_iter()),
            cold_start: mean(cold_precision.into_iter()),
            cold_item_share: ratio(cold_items, total_items),
            evaluated_users: accuracy.len(),
            test_users: lists.len(),
        };

        if let Some(name) = first_non_finite(&values) {
            return Err(AlgorithmError::Evaluation {
                strategy: "metrics".to_string(),
                reason: format!("{} is not finite", name),
            });
        }

        debug!(
            evaluated = values.evaluated_users,
            test_users = values.test_users,
            "Evaluated recommendation lists"
        );
        let metrics = RecommendMetrics::new(values);
        info!(
            precision = metrics.precision(),
            recall = metrics.recall(),
            overall = metrics.overall_score(),
            "Evaluation complete"
        );
        Ok(metrics)
    }

    fn is_cold_item(&self, master_id: MasterId) -> bool {
        self.data
            .get_master(master_id)
            .is_none_or(|m| m.order_count < self.config.cold_item_orders)
    }

    fn novelty(&self, user_id: UserId, list: &[MasterId]) -> f64 {
        let mut seen: HashSet<MasterId> = self
            .data
            .get_user_orders(user_id)
            .iter()
            .map(|o| o.master_id)
            .collect();
        seen.extend(
            self.data
                .get_user_behaviors(user_id)
                .iter()
                .filter(|b| b.target == TargetKind::Master)
                .map(|b| b.target_id),
        );
        let unseen = list.iter().filter(|m| !seen.contains(m)).count();
        ratio(unseen, list.len())
    }

    fn timeliness(&self, list: &[MasterId]) -> f64 {
        let half_life = self.config.timeliness_half_life_days;
        mean(list.iter().map(|&m| {
            let last_active = self
                .data
                .last_order_at(m)
                .or_else(|| self.data.get_master(m).and_then(|master| master.updated_at));
            match last_active {
                Some(t) if half_life > 0.0 => (-self.data.days_since(t) / half_life).exp(),
                _ => 0.0,
            }
        }))
    }
}

fn accuracy_for(list: &[MasterId], truth: &HashMap<MasterId, f64>) -> Accuracy {
    let hits: Vec<usize> = list
        .iter()
        .enumerate()
        .filter(|(_, m)| truth.contains_key(m))
        .map(|(rank, _)| rank)
        .collect();

    let precision = ratio(hits.len(), list.len());
    let recall = ratio(hits.len(), truth.len());
    let mrr = hits.first().map(|&rank| 1.0 / (rank + 1) as f64).unwrap_or(0.0);

    let gain = |rating: f64| 2f64.powf(rating) - 1.0;
    let discount = |rank: usize| (rank as f64 + 2.0).log2();
    let dcg: f64 = hits
        .iter()
        .map(|&rank| gain(truth[&list[rank]]) / discount(rank))
        .sum();

    let mut ideal: Vec<f64> = truth.values().copied().collect();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let idcg: f64 = ideal
        .iter()
        .take(list.len())
        .enumerate()
        .map(|(rank, &rating)| gain(rating) / discount(rank))
        .sum();
    let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };

    Accuracy {
        precision,
        recall,
        mrr,
        ndcg,
    }
}

fn mean_pairwise(list: &[MasterId], similarity: &(dyn Fn(MasterId, MasterId) -> f64 + Sync)) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, &a) in list.iter().enumerate() {
        for &b in &list[i + 1..] {
            total += similarity(a, b);
            pairs += 1;
        }
    }
    if pairs == 0 { 0.0 } else { total / pairs as f64 }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn first_non_finite(values: &MetricValues) -> Option<&'static str> {
    [
        ("precision", values.precision),
        ("recall", values.recall),
        ("mrr", values.mrr),
        ("ndcg", values.ndcg),
        ("coverage", values.coverage),
        ("diversity", values.diversity),
        ("novelty", values.novelty),
        ("timeliness", values.timeliness),
        ("cold_start", values.cold_start),
    ]
    .into_iter()
    .find(|(_, v)| !v.is_finite())
    .map(|(name, _)| name)
}
