//! Restricts results to masters offering the requested game.

use crate::traits::Filter;
use anyhow::Result;
use data_loader::DataIndex;
use sources::{Candidate, UserContext};
use std::sync::Arc;

/// No-op unless the request names a game
pub struct GameMatchFilter {
    data_index: Arc<DataIndex>,
}

impl GameMatchFilter {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        Self { data_index }
    }
}

impl Filter for GameMatchFilter {
    fn name(&self) -> &str {
        "GameMatchFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, context: &UserContext) -> Result<Vec<Candidate>> {
        let Some(game_id) = context.game_id else {
            return Ok(candidates);
        };
        Ok(candidates
            .into_iter()
            .filter(|c| {
                self.data_index
                    .get_master(c.master_id)
                    .is_some_and(|m| m.offers_game(game_id))
            })
            .collect())
    }
}
