//! Offline quality metrics.
//!
//! Once built a [`RecommendMetrics`] never changes. Construction clamps every
//! metric into [0, 1] and maps NaN to 0.0, so downstream weighting can
//! trust the values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw metric values as computed by the evaluator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricValues {
    pub precision: f64,
    pub recall: f64,
    pub mrr: f64,
    pub ndcg: f64,
    pub coverage: f64,
    pub diversity: f64,
    pub novelty: f64,
    pub timeliness: f64,
    pub cold_start: f64,
    pub cold_item_share: f64,
    /// Test users with at least one ground-truth positive
    pub evaluated_users: usize,
    pub test_users: usize,
}

/// Snapshot of the nine quality metrics plus derived scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendMetrics {
    precision: f64,
    recall: f64,
    f1: f64,
    mrr: f64,
    ndcg: f64,
    coverage: f64,
    diversity: f64,
    novelty: f64,
    timeliness: f64,
    cold_start: f64,
    cold_item_share: f64,
    evaluated_users: usize,
    test_users: usize,
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision == 0.0 || recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl RecommendMetrics {
    pub fn new(values: MetricValues) -> Self {
        let precision = unit(values.precision);
        let recall = unit(values.recall);
        Self {
            precision,
            recall,
            f1: f1(precision, recall),
            mrr: unit(values.mrr),
            ndcg: unit(values.ndcg),
            coverage: unit(values.coverage),
            diversity: unit(values.diversity),
            novelty: unit(values.novelty),
            timeliness: unit(values.timeliness),
            cold_start: unit(values.cold_start),
            cold_item_share: unit(values.cold_item_share),
            evaluated_users: values.evaluated_users,
            test_users: values.test_users,
        }
    }

    /// Weighted blend of two snapshots; F1 is recomputed, not blended.
    pub fn blend(a: &RecommendMetrics, weight_a: f64, b: &RecommendMetrics, weight_b: f64) -> Self {
        let mix = |x: f64, y: f64| weight_a * x + weight_b * y;
        Self::new(MetricValues {
            precision: mix(a.precision, b.precision),
            recall: mix(a.recall, b.recall),
            mrr: mix(a.mrr, b.mrr),
            ndcg: mix(a.ndcg, b.ndcg),
            coverage: mix(a.coverage, b.coverage),
            diversity: mix(a.diversity, b.diversity),
            novelty: mix(a.novelty, b.novelty),
            timeliness: mix(a.timeliness, b.timeliness),
            cold_start: mix(a.cold_start, b.cold_start),
            cold_item_share: mix(a.cold_item_share, b.cold_item_share),
            evaluated_users: a.evaluated_users.max(b.evaluated_users),
            test_users: a.test_users.max(b.test_users),
        })
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn recall(&self) -> f64 {
        self.recall
    }

    pub fn f1(&self) -> f64 {
        self.f1
    }

    pub fn mrr(&self) -> f64 {
        self.mrr
    }

    pub fn ndcg(&self) -> f64 {
        self.ndcg
    }

    pub fn coverage(&self) -> f64 {
        self.coverage
    }

    pub fn diversity(&self) -> f64 {
        self.diversity
    }

    pub fn novelty(&self) -> f64 {
        self.novelty
    }

    pub fn timeliness(&self) -> f64 {
        self.timeliness
    }

    pub fn cold_start(&self) -> f64 {
        self.cold_start
    }

    /// Share of recommended items that are themselves cold (not in the overall score)
    pub fn cold_item_share(&self) -> f64 {
        self.cold_item_share
    }

    pub fn evaluated_users(&self) -> usize {
        self.evaluated_users
    }

    pub fn test_users(&self) -> usize {
        self.test_users
    }

    /// 0.3·P + 0.3·R + 0.1·MRR + 0.1·NDCG + 0.05·(coverage + diversity + novelty + timeliness)
    pub fn overall_score(&self) -> f64 {
        0.3 * self.precision
            + 0.3 * self.recall
            + 0.1 * self.mrr
            + 0.1 * self.ndcg
            + 0.05 * (self.coverage + self.diversity + self.novelty + self.timeliness)
    }

    /// 0.2·P + 0.2·R + 0.15·F1 + 0.15·NDCG + 0.1·(diversity + novelty + coverage)
    pub fn quality_score(&self) -> f64 {
        0.2 * self.precision
            + 0.2 * self.recall
            + 0.15 * self.f1
            + 0.15 * self.ndcg
            + 0.1 * (self.diversity + self.novelty + self.coverage)
    }

    pub fn is_good_quality(&self) -> bool {
        self.quality_score() >= 0.7
    }
}

impl fmt::Display for RecommendMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Evaluation Report ===")?;
        writeln!(
            f,
            "Users: {} evaluated / {} in test set",
            self.evaluated_users, self.test_users
        )?;
        writeln!(f, "Precision:   {:.4}", self.precision)?;
        writeln!(f, "Recall:      {:.4}", self.recall)?;
        writeln!(f, "F1:          {:.4}", self.f1)?;
        writeln!(f, "MRR:         {:.4}", self.mrr)?;
        writeln!(f, "NDCG:        {:.4}", self.ndcg)?;
        writeln!(f, "Coverage:    {:.4}", self.coverage)?;
        writeln!(f, "Diversity:   {:.4}", self.diversity)?;
        writeln!(f, "Novelty:     {:.4}", self.novelty)?;
        writeln!(f, "Timeliness:  {:.4}", self.timeliness)?;
        writeln!(f, "Cold start:  {:.4} (cold items {:.1}%)", self.cold_start, self.cold_item_share * 100.0)?;
        writeln!(f, "Overall:     {:.4}", self.overall_score())?;
        write!(
            f,
            "Quality:     {:.4} ({})",
            self.quality_score(),
            if self.is_good_quality() { "good" } else { "needs work" }
        )
    }
}
