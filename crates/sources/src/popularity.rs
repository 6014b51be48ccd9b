//! Popularity recall: well-rated, busy masters who are online right now.
//!
//! Independent of the requester, so it keeps cold-start users from getting an
//! empty page.

use crate::recall::RecallStrategy;
use crate::types::{Candidate, CandidateSource, UserContext};
use anyhow::Result;
use data_loader::{DataIndex, GameMaster};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Order count at which the volume component saturates
const ORDER_SATURATION: f64 = 100.0;

pub struct PopularityRecall {
    data_index: Arc<DataIndex>,
    limit: usize,
}

impl PopularityRecall {
    pub fn new(data_index: Arc<DataIndex>, limit: usize) -> Self {
        Self { data_index, limit }
    }

    /// Configure the number of candidates (default is set by the caller)
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// 60% rating, 40% order volume, both in [0, 1]
pub fn popularity_score(master: &GameMaster) -> f64 {
    let rating = master.score.unwrap_or(0.0) / 5.0;
    let volume = (master.order_count as f64 / ORDER_SATURATION).min(1.0);
    rating * 0.6 + volume * 0.4
}

impl RecallStrategy for PopularityRecall {
    fn name(&self) -> &str {
        "popularity"
    }

    #[instrument(skip(self, context), fields(user_id = context.user_id))]
    fn recall(&self, context: &UserContext) -> Result<Vec<Candidate>> {
        let mut candidates: Vec<Candidate> = self
            .data_index
            .all_master_ids()
            .into_iter()
            .filter_map(|id| self.data_index.get_master(id))
            .filter(|m| m.is_online() && m.score.is_some())
            .map(|m| Candidate::new(m.id, CandidateSource::Popularity, popularity_score(m)))
            .collect();

        candidates.sort_by(|a, b| b.recall_score.total_cmp(&a.recall_score));
        candidates.truncate(self.limit);

        debug!("Popularity recall found {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{build_index, master};
    use data_loader::MasterStatus;

    #[test]
    fn test_orders_by_popularity_and_skips_offline() {
        let mut index = build_index();
        index.insert_master(master(1, &["moba"], 3.0, 10));
        index.insert_master(master(2, &["moba"], 5.0, 200));
        let mut offline = master(3, &["moba"], 5.0, 500);
        offline.status = MasterStatus::Offline;
        index.insert_master(offline);
        let mut unrated = master(4, &["moba"], 0.0, 10);
        unrated.score = None;
        index.insert_master(unrated);

        let recall = PopularityRecall::new(Arc::new(index), 50);
        let candidates = recall.recall(&UserContext::new(1)).unwrap();
        let ids: Vec<_> = candidates.iter().map(|c| c.master_id).collect();

        assert_eq!(ids, vec![2, 1]);
        assert!((candidates[0].recall_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_popularity_score_bounds() {
        let m = master(1, &[], 5.0, 10_000);
        assert!((popularity_score(&m) - 1.0).abs() < 1e-12);

        let mut empty = master(2, &[], 0.0, 0);
        empty.score = None;
        assert_eq!(popularity_score(&empty), 0.0);
    }

    #[test]
    fn test_with_limit() {
        let mut index = build_index();
        for id in 1..=4 {
            index.insert_master(master(id, &["moba"], 4.0, 10));
        }
        let recall = PopularityRecall::new(Arc::new(index), 50).with_limit(2);
        assert_eq!(recall.recall(&UserContext::new(1)).unwrap().len(), 2);
    }
}
