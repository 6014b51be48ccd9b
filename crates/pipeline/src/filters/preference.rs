//! Drops masters that contradict what the user declared.

use crate::traits::{Filter, OnFailure};
use anyhow::Result;
use data_loader::{DataIndex, GameMaster};
use serde::{Deserialize, Serialize};
use sources::{Candidate, UserContext};
use std::sync::Arc;

/// Which declared preferences are hard requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceRules {
    /// Drop masters sharing no game type with a non-empty declared set
    pub require_game_type_match: bool,
    /// Drop masters sharing no tag with a non-empty declared set
    pub require_tag_match: bool,
    /// Drop masters whose region differs from the user's
    pub enforce_region: bool,
}

impl Default for PreferenceRules {
    fn default() -> Self {
        Self {
            require_game_type_match: true,
            require_tag_match: true,
            enforce_region: false,
        }
    }
}

/// Exclusions, price band, game types, tags and (optionally) region.
///
/// Anything the user left undeclared is not checked. A master with no price
/// passes the price band.
pub struct PreferenceFilter {
    data_index: Arc<DataIndex>,
    rules: PreferenceRules,
}

impl PreferenceFilter {
    pub fn new(data_index: Arc<DataIndex>, rules: PreferenceRules) -> Self {
        Self { data_index, rules }
    }

    fn accepts(&self, master: &GameMaster, context: &UserContext) -> bool {
        if context.excluded_masters.contains(&master.id) {
            return false;
        }

        if let (Some(range), Some(price)) = (context.price_range, master.price) {
            if !range.contains(price) {
                return false;
            }
        }

        if self.rules.require_game_type_match
            && !context.game_types.is_empty()
            && !context.game_types.iter().any(|t| master.game_types.contains(t))
        {
            return false;
        }

        if self.rules.require_tag_match
            && !context.tags.is_empty()
            && !context.tags.iter().any(|t| master.tags.contains(t))
        {
            return false;
        }

        if self.rules.enforce_region {
            if let (Some(user_region), Some(master_region)) = (&context.region, &master.region) {
                if user_region != master_region {
                    return false;
                }
            }
        }

        true
    }
}

impl Filter for PreferenceFilter {
    fn name(&self) -> &str {
        "PreferenceFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, context: &UserContext) -> Result<Vec<Candidate>> {
        Ok(candidates
            .into_iter()
            .filter(|c| {
                self.data_index
                    .get_master(c.master_id)
                    .is_some_and(|m| self.accepts(m, context))
            })
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
    use data_loader::PriceRange;

    fn ids(candidates: &[Candidate]) -> Vec<u64> {
        candidates.iter().map(|c| c.master_id).collect()
    }

    #[test]
    fn test_excluded_and_price_band() {
        let mut cheap = master(1);
        cheap.price = Some(20.0);
        let mut pricey = master(2);
        pricey.price = Some(300.0);
        let mut unpriced = master(3);
        unpriced.price = None;
        let index = index_with(vec![cheap, pricey, unpriced, master(4)]);

        let mut context = UserContext::new(1);
        context.price_range = Some(PriceRange {
            min: Some(10.0),
            max: Some(150.0),
        });
        context.excluded_masters.insert(4);

        let filter = PreferenceFilter::new(index, PreferenceRules::default());
        let filtered = filter
            .apply((1..=4).map(|id| candidate(id, 0.5)).collect(), &context)
            .unwrap();
        assert_eq!(ids(&filtered), vec![1, 3]);
    }

    #[test]
    fn test_game_type_and_tag_requirements() {
        let mut moba = master(1);
        moba.game_types = vec!["moba".to_string()];
        moba.tags = vec!["chill".to_string()];
        let mut card = master(2);
        card.game_types = vec!["card".to_string()];
        card.tags = vec!["chill".to_string()];
        let index = index_with(vec![moba, card]);

        let mut context = UserContext::new(1);
        context.game_types = vec!["moba".to_string()];
        context.tags = vec!["chill".to_string()];
        let candidates = vec![candidate(1, 0.5), candidate(2, 0.5)];

        let strict = PreferenceFilter::new(index.clone(), PreferenceRules::default());
        assert_eq!(ids(&strict.apply(candidates.clone(), &context).unwrap()), vec![1]);

        let relaxed = PreferenceFilter::new(
            index,
            PreferenceRules {
                require_game_type_match: false,
                ..Default::default()
            },
        );
        assert_eq!(ids(&relaxed.apply(candidates, &context).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_region_only_when_enforced() {
        let mut south = master(1);
        south.region = Some("south".to_string());
        let index = index_with(vec![south]);
        let mut context = UserContext::new(1);
        context.region = Some("north".to_string());

        let lenient = PreferenceFilter::new(index.clone(), PreferenceRules::default());
        assert_eq!(lenient.apply(vec![candidate(1, 0.5)], &context).unwrap().len(), 1);

        let strict = PreferenceFilter::new(
            index,
            PreferenceRules {
                enforce_region: true,
                ..Default::default()
            },
        );
        assert!(strict.apply(vec![candidate(1, 0.5)], &context).unwrap().is_empty());
    }

    #[test]
    fn test_empty_context_keeps_everything() {
        let index = index_with(vec![master(1), master(2)]);
        let filter = PreferenceFilter::new(index, PreferenceRules::default());
        let filtered = filter
            .apply(vec![candidate(2, 0.5), candidate(1, 0.5)], &UserContext::new(9))
            .unwrap();
        assert_eq!(ids(&filtered), vec![2, 1]);
    }
}
