//! Preference recall: masters who play what the user says they play.
//!
//! Uses the `masters_by_game_type` secondary index, so cost is proportional
//! to the number of matching masters rather than the whole catalog.

use crate::recall::RecallStrategy;
use crate::types::{Candidate, CandidateSource, UserContext};
use anyhow::Result;
use data_loader::{DataIndex, MasterId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct PreferenceRecall {
    data_index: Arc<DataIndex>,
    limit: usize,
}

impl PreferenceRecall {
    pub fn new(data_index: Arc<DataIndex>, limit: usize) -> Self {
        Self { data_index, limit }
    }

    /// Fraction of the user's declared game types the master covers
    fn overlap(&self, master_id: MasterId, context: &UserContext) -> f64 {
        let Some(master) = self.data_index.get_master(master_id) else {
            return 0.0;
        };
        let matched = context
            .game_types
            .iter()
            .filter(|t| master.game_types.contains(t))
            .count();
        matched as f64 / context.game_types.len() as f64
    }
}

impl RecallStrategy for PreferenceRecall {
    fn name(&self) -> &str {
        "preference"
    }

    #[instrument(skip(self, context), fields(user_id = context.user_id))]
    fn recall(&self, context: &UserContext) -> Result<Vec<Candidate>> {
        if context.game_types.is_empty() {
            return Ok(Vec::new());
        }

        // BTreeSet keeps the walk in ascending ID order
        let matching: BTreeSet<MasterId> = context
            .game_types
            .iter()
            .flat_map(|t| self.data_index.get_masters_by_game_type(t).iter().copied())
            .collect();

        let mut candidates: Vec<Candidate> = matching
            .into_iter()
            .map(|id| Candidate::new(id, CandidateSource::Preference, self.overlap(id, context)))
            .collect();

        // Stable sort: equal overlap keeps ascending ID order
        candidates.sort_by(|a, b| b.recall_score.total_cmp(&a.recall_score));
        candidates.truncate(self.limit);

        debug!("Preference recall found {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{build_index, master};

    #[test]
    fn test_matches_declared_game_types() {
        let mut index = build_index();
        index.insert_master(master(1, &["moba", "fps"], 4.5, 50));
        index.insert_master(master(2, &["moba"], 4.0, 20));
        index.insert_master(master(3, &["card"], 4.9, 90));
        index.build_secondary_indices();

        let recall = PreferenceRecall::new(Arc::new(index), 10);
        let mut context = UserContext::new(1);
        context.game_types = vec!["moba".to_string(), "fps".to_string()];

        let candidates = recall.recall(&context).unwrap();
        let ids: Vec<_> = candidates.iter().map(|c| c.master_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(candidates[0].recall_score, 1.0);
        assert_eq!(candidates[1].recall_score, 0.5);
    }

    #[test]
    fn test_no_declared_types_recalls_nothing() {
        let mut index = build_index();
        index.insert_master(master(1, &["moba"], 4.5, 50));
        index.build_secondary_indices();

        let recall = PreferenceRecall::new(Arc::new(index), 10);
        assert!(recall.recall(&UserContext::new(1)).unwrap().is_empty());
    }

    #[test]
    fn test_respects_limit() {
        let mut index = build_index();
        for id in 1..=5 {
            index.insert_master(master(id, &["moba"], 4.5, 50));
        }
        index.build_secondary_indices();

        let recall = PreferenceRecall::new(Arc::new(index), 3);
        let mut context = UserContext::new(1);
        context.game_types = vec!["moba".to_string()];

        assert_eq!(recall.recall(&context).unwrap().len(), 3);
    }
}
