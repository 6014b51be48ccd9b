//! Diversity rerank: break up runs of masters from the same category.
//!
//! Walks the ranked list once. Whenever the next item would repeat the
//! previous item's primary category, the first item inside the look-ahead
//! window with a different category is pulled forward instead. If the
//! window holds nothing different, the order is kept.

use crate::traits::Filter;
use anyhow::Result;
use data_loader::{DataIndex, MasterId};
use sources::{Candidate, UserContext};
use std::sync::Arc;

pub const DEFAULT_WINDOW: usize = 5;

pub struct DiversityRerank {
    data_index: Arc<DataIndex>,
    window: usize,
}

impl DiversityRerank {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        Self {
            data_index,
            window: DEFAULT_WINDOW,
        }
    }

    /// Configure the look-ahead window (default: 5, 0 disables the rerank)
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    fn category(&self, master_id: MasterId) -> Option<&str> {
        self.data_index
            .get_master(master_id)
            .and_then(|m| m.primary_category())
    }

    /// Same category only when both sides have one
    fn repeats(&self, previous: Option<&str>, candidate: &Candidate) -> bool {
        match (previous, self.category(candidate.master_id)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn rerank(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        if self.window == 0 || candidates.len() < 3 {
            return candidates;
        }

        let mut remaining = candidates;
        let mut result = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let previous = result
                .last()
                .and_then(|c: &Candidate| self.category(c.master_id));

            let pick = if self.repeats(previous, &remaining[0]) {
                remaining
                    .iter()
                    .take(self.window)
                    .position(|c| !self.repeats(previous, c))
                    .unwrap_or(0)
            } else {
                0
            };
            result.push(remaining.remove(pick));
        }

        result
    }
}

impl Filter for DiversityRerank {
    fn name(&self) -> &str {
        "DiversityRerank"
    }

    fn apply(&self, candidates: Vec<Candidate>, _context: &UserContext) -> Result<Vec<Candidate>> {
        Ok(self.rerank(candidates))
    }
}
