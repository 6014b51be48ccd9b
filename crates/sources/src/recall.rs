//! Recall: fan out to independent strategies and union their candidates.
//!
//! Each strategy is optional. One that errors is logged and skipped, one that
//! finds nothing simply contributes nothing; neither blocks the others.

use crate::types::{Candidate, UserContext};
use anyhow::Result;
use data_loader::MasterId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// A single source of candidate masters.
///
/// `Send + Sync` lets the service run every strategy in parallel.
pub trait RecallStrategy: Send + Sync {
    /// Returns the name of this strategy (for logging)
    fn name(&self) -> &str;

    /// Propose candidates for a user, strongest first
    fn recall(&self, context: &UserContext) -> Result<Vec<Candidate>>;
}

/// Limits and thresholds for the built-in strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    pub preference_limit: usize,
    /// Profile similarity a user must exceed to count as similar
    pub similar_user_threshold: f64,
    pub similar_user_limit: usize,
    pub masters_per_similar_user: usize,
    pub popularity_limit: usize,
    /// Candidates taken from the configured recommendation algorithm
    pub algorithm_limit: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            preference_limit: 100,
            similar_user_threshold: 0.3,
            similar_user_limit: 10,
            masters_per_similar_user: 5,
            popularity_limit: 50,
            algorithm_limit: 50,
        }
    }
}

/// Runs all registered strategies and merges their output.
///
/// ## Usage
/// ```ignore
/// let recall = RecallService::new()
///     .add_strategy(PreferenceRecall::new(index.clone(), 100))
///     .add_strategy(PopularityRecall::new(index.clone(), 50));
///
/// let candidates = recall.recall(&context);
/// ```
#[derive(Default)]
pub struct RecallService {
    strategies: Vec<Box<dyn RecallStrategy>>,
}

impl RecallService {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Add a strategy (builder pattern). Earlier strategies win ties on merge.
    pub fn add_strategy(mut self, strategy: impl RecallStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Union of all strategies, deduplicated by master ID.
    ///
    /// Output order is first-seen order, walking strategies in registration
    /// order. A duplicate keeps its first source and the highest recall score.
    #[instrument(skip(self, context), fields(user_id = context.user_id))]
    pub fn recall(&self, context: &UserContext) -> Vec<Candidate> {
        let results: Vec<(&str, Result<Vec<Candidate>>)> = self
            .strategies
            .par_iter()
            .map(|strategy| (strategy.name(), strategy.recall(context)))
            .collect();

        let mut positions: HashMap<MasterId, usize> = HashMap::new();
        let mut merged: Vec<Candidate> = Vec::new();

        for (name, result) in results {
            let candidates = match result {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(strategy = name, error = %e, "Recall strategy failed, skipping");
                    continue;
                }
            };
            debug!("{} recalled {} candidates", name, candidates.len());

            for candidate in candidates {
                match positions.get(&candidate.master_id) {
                    Some(&i) => {
                        let existing = &mut merged[i];
                        if candidate.recall_score > existing.recall_score {
                            existing.recall_score = candidate.recall_score;
                            existing.score = candidate.recall_score;
                        }
                    }
                    None => {
                        positions.insert(candidate.master_id, merged.len());
                        merged.push(candidate);
                    }
                }
            }
        }

        debug!("Recall produced {} unique candidates", merged.len());
        merged
    }
}
