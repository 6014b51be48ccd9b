//! The configured recommendation algorithm as one more recall source.

use algorithms::RecommendAlgorithm;
use anyhow::Result;
use sources::{Candidate, CandidateSource, RecallStrategy, UserContext};
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct AlgorithmRecall {
    algorithm: Arc<dyn RecommendAlgorithm>,
    limit: usize,
}

impl AlgorithmRecall {
    pub fn new(algorithm: Arc<dyn RecommendAlgorithm>, limit: usize) -> Self {
        Self { algorithm, limit }
    }
}

impl RecallStrategy for AlgorithmRecall {
    fn name(&self) -> &str {
        "algorithm"
    }

    #[instrument(skip(self, context), fields(user_id = context.user_id, algorithm = self.algorithm.name()))]
    fn recall(&self, context: &UserContext) -> Result<Vec<Candidate>> {
        let candidates: Vec<Candidate> = self
            .algorithm
            .recommend_masters(context.user_id, context.game_id, self.limit)
            .into_iter()
            .filter(|item| !context.excluded_masters.contains(&item.id))
            .map(|item| Candidate::new(item.id, CandidateSource::Algorithm, item.score.clamp(0.0, 1.0)))
            .collect();

        debug!("Algorithm recall found {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algorithms::{CollaborativeFiltering, EvaluationConfig};
    use data_loader::DataIndex;

    #[test]
    fn test_no_history_recalls_nothing() {
        let algorithm = Arc::new(CollaborativeFiltering::new(
            Arc::new(DataIndex::new()),
            EvaluationConfig::default(),
        ));
        let recall = AlgorithmRecall::new(algorithm, 50);
        assert_eq!(recall.name(), "algorithm");
        assert!(recall.recall(&UserContext::new(1)).unwrap().is_empty());
    }
}
