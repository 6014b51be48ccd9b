//! FilterService: the fixed post-ranking stage chain.
//!
//! validity → game match → preference → business rules → diversity rerank

use crate::filter_pipeline::FilterPipeline;
use crate::filters::{BusinessRuleFilter, BusinessRules, GameMatchFilter, PreferenceFilter, ValidityFilter};
use crate::filters::preference::PreferenceRules;
use crate::rerank::{DEFAULT_WINDOW, DiversityRerank};
use data_loader::DataIndex;
use serde::{Deserialize, Serialize};
use sources::{Candidate, UserContext};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The `[filter]` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub preference: PreferenceRules,
    pub business: BusinessRules,
    /// Diversity look-ahead window; 0 disables the rerank
    pub diversity_window: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            preference: PreferenceRules::default(),
            business: BusinessRules::default(),
            diversity_window: DEFAULT_WINDOW,
        }
    }
}

pub struct FilterService {
    pipeline: FilterPipeline,
}

impl FilterService {
    pub fn new(data_index: Arc<DataIndex>, config: &FilterConfig) -> Self {
        let pipeline = FilterPipeline::new()
            .add_filter(ValidityFilter::new(data_index.clone()))
            .add_filter(GameMatchFilter::new(data_index.clone()))
            .add_filter(PreferenceFilter::new(data_index.clone(), config.preference.clone()))
            .add_filter(BusinessRuleFilter::new(data_index.clone(), config.business.clone()))
            .add_filter(DiversityRerank::new(data_index).with_window(config.diversity_window));
        Self { pipeline }
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.pipeline.filter_names()
    }

    #[instrument(skip(self, candidates, context), fields(user_id = context.user_id, count = candidates.len()))]
    pub fn filter(&self, candidates: Vec<Candidate>, context: &UserContext) -> Vec<Candidate> {
        let filtered = self.pipeline.apply(candidates, context);
        debug!("{} candidates survived filtering", filtered.len());
        filtered
    }
}
