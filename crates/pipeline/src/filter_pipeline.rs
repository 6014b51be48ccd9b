//! The FilterPipeline chains filters using the builder pattern.

use crate::traits::{Filter, OnFailure};
use sources::{Candidate, UserContext};
use tracing;

/// Chains multiple filters together into a processing pipeline.
///
/// ## Usage
/// ```ignore
/// let pipeline = FilterPipeline::new()
///     .add_filter(ValidityFilter::new(index.clone()))
///     .add_filter(PreferenceFilter::new(index.clone(), config.clone()))
///     .add_filter(BusinessRuleFilter::new(index.clone(), config.business.clone()));
///
/// let filtered = pipeline.apply(candidates, &context);
/// ```
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter to the pipeline (builder pattern).
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Apply all filters in sequence to the candidates.
    ///
    /// A filter that errors is logged. Depending on its [`OnFailure`] policy
    /// the candidates it was given either flow on unchanged or are all dropped.
    pub fn apply(&self, candidates: Vec<Candidate>, context: &UserContext) -> Vec<Candidate> {
        let mut current = candidates;
        for filter in &self.filters {
            tracing::debug!(
                "Applying filter: {} (input count: {})",
                filter.name(),
                current.len()
            );
            let input = current.clone();
            current = match filter.apply(current, context) {
                Ok(filtered) => filtered,
                Err(e) => match filter.on_failure() {
                    OnFailure::Skip => {
                        tracing::warn!(filter = filter.name(), error = %e, "Filter failed, skipping");
                        input
                    }
                    OnFailure::DropAll => {
                        tracing::warn!(
                            filter = filter.name(),
                            error = %e,
                            dropped = input.len(),
                            "Filter failed, dropping its candidates"
                        );
                        Vec::new()
                    }
                },
            };
            tracing::debug!(
                "Filter applied: {} (output count: {})",
                filter.name(),
                current.len()
            );
        }
        current
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use sources::CandidateSource;

    struct DropOdd;

    impl Filter for DropOdd {
        fn name(&self) -> &str {
            "DropOdd"
        }

        fn apply(&self, candidates: Vec<Candidate>, _context: &UserContext) -> Result<Vec<Candidate>> {
            Ok(candidates.into_iter().filter(|c| c.master_id % 2 == 0).collect())
        }
    }

    struct Broken(OnFailure);

    impl Filter for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn apply(&self, _candidates: Vec<Candidate>, _context: &UserContext) -> Result<Vec<Candidate>> {
            Err(anyhow!("rule store unavailable"))
        }

        fn on_failure(&self) -> OnFailure {
            self.0
        }
    }

    fn candidates() -> Vec<Candidate> {
        (1..=4)
            .map(|id| Candidate::new(id, CandidateSource::Popularity, 0.5))
            .collect()
    }

    #[test]
    fn test_empty_pipeline() {
        let pipeline = FilterPipeline::new();
        let filtered = pipeline.apply(candidates(), &UserContext::new(1));
        assert_eq!(filtered.len(), 4);
    }

    #[test]
    fn test_single_filter_keeps_order() {
        let pipeline = FilterPipeline::new().add_filter(DropOdd);
        let filtered = pipeline.apply(candidates(), &UserContext::new(1));
        let ids: Vec<_> = filtered.iter().map(|c| c.master_id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_failing_filter_is_skipped() {
        let pipeline = FilterPipeline::new()
            .add_filter(Broken(OnFailure::Skip))
            .add_filter(DropOdd);
        assert_eq!(pipeline.filter_names(), vec!["Broken", "DropOdd"]);

        let filtered = pipeline.apply(candidates(), &UserContext::new(1));
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_failing_guard_filter_drops_everything() {
        let pipeline = FilterPipeline::new()
            .add_filter(DropOdd)
            .add_filter(Broken(OnFailure::DropAll));

        let filtered = pipeline.apply(candidates(), &UserContext::new(1));
        assert!(filtered.is_empty());
    }
}
