//! Platform business rules: minimum quality and availability.

use crate::traits::{Filter, OnFailure};
use anyhow::Result;
use data_loader::{DataIndex, GameMaster, MasterStatus};
use serde::{Deserialize, Serialize};
use sources::{Candidate, UserContext};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessRules {
    pub min_score: f64,
    pub min_orders: u32,
    pub require_online: bool,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            min_score: 4.0,
            min_orders: 10,
            require_online: true,
        }
    }
}

impl BusinessRules {
    /// Suspended masters never pass, whatever the configuration
    pub fn allows(&self, master: &GameMaster) -> bool {
        master.status != MasterStatus::Suspended
            && master.score.is_some_and(|s| s >= self.min_score)
            && master.order_count >= self.min_orders
            && (!self.require_online || master.is_online())
    }
}

pub struct BusinessRuleFilter {
    data_index: Arc<DataIndex>,
    rules: BusinessRules,
}

impl BusinessRuleFilter {
    pub fn new(data_index: Arc<DataIndex>, rules: BusinessRules) -> Self {
        Self { data_index, rules }
    }
}

impl Filter for BusinessRuleFilter {
    fn name(&self) -> &str {
        "BusinessRuleFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, _context: &UserContext) -> Result<Vec<Candidate>> {
        Ok(candidates
            .into_iter()
            .filter(|c| {
                self.data_index
                    .get_master(c.master_id)
                    .is_some_and(|m| self.rules.allows(m))
            })
            .collect())
    }

    fn on_failure(&self) -> OnFailure {
        OnFailure::DropAll
    }
}
