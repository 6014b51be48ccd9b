//! Drops candidates that cannot be recommended at all.

use crate::traits::{Filter, OnFailure};
use anyhow::Result;
use data_loader::DataIndex;
use sources::{Candidate, UserContext};
use std::collections::HashSet;
use std::sync::Arc;

/// Removes unknown masters, non-finite scores and repeated IDs.
///
/// The first occurrence of a duplicated ID wins.
pub struct ValidityFilter {
    data_index: Arc<DataIndex>,
}

impl ValidityFilter {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        Self { data_index }
    }
}

impl Filter for ValidityFilter {
    fn name(&self) -> &str {
        "ValidityFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, _context: &UserContext) -> Result<Vec<Candidate>> {
        let mut seen = HashSet::new();
        Ok(candidates
            .into_iter()
            .filter(|c| c.score.is_finite())
            .filter(|c| self.data_index.get_master(c.master_id).is_some())
            .filter(|c| seen.insert(c.master_id))
            .collect())
    }

    fn on_failure(&self) -> OnFailure {
        OnFailure::DropAll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{candidate, index_with, master};

    #[test]
    fn test_drops_unknown_nan_and_duplicates() {
        let index = index_with(vec![master(1), master(2)]);
        let mut nan = candidate(2, 0.5);
        nan.score = f64::NAN;

        let filtered = ValidityFilter::new(index)
            .apply(
                vec![candidate(1, 0.9), candidate(99, 0.8), nan, candidate(1, 0.1)],
                &UserContext::new(1),
            )
            .unwrap();

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].master_id, 1);
        assert_eq!(filtered[0].score, 0.9);
    }
}
