//! Shared types for candidate generation.

use data_loader::{GameId, MasterId, PriceRange, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which recall strategy produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Game-type match against the declared profile
    Preference,
    /// Masters chosen by users with a similar profile
    SimilarUsers,
    /// Globally popular online masters
    Popularity,
    /// The configured recommendation algorithm
    Algorithm,
}

/// A master proposed for a user, before or after ranking
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub master_id: MasterId,
    pub source: CandidateSource,
    /// Strength of the recall signal, in [0, 1]
    pub recall_score: f64,
    /// Ranking score; equals `recall_score` until a ranker overwrites it
    pub score: f64,
}

impl Candidate {
    pub fn new(master_id: MasterId, source: CandidateSource, recall_score: f64) -> Self {
        Self {
            master_id,
            source,
            recall_score,
            score: recall_score,
        }
    }
}

/// Everything the pipeline needs to know about the requesting user.
///
/// Built once per request. An unknown user yields an empty context, which
/// every downstream stage treats as "no preferences, no history".
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub user_id: UserId,

    // Declared profile
    pub age: Option<u32>,
    pub region: Option<String>,
    pub game_types: Vec<String>,
    pub tags: Vec<String>,
    pub price_range: Option<PriceRange>,
    pub excluded_masters: HashSet<MasterId>,

    // Interaction history
    /// Masters the user viewed, favorited or ordered
    pub interacted_masters: HashSet<MasterId>,
    /// Masters the user ordered from, in order of first purchase
    pub ordered_masters: Vec<MasterId>,
    pub behavior_count: usize,

    /// Restrict results to masters offering this game
    pub game_id: Option<GameId>,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Builder: restrict the request to one game
    pub fn with_game(mut self, game_id: Option<GameId>) -> Self {
        self.game_id = game_id;
        self
    }

    pub fn has_history(&self) -> bool {
        !self.interacted_masters.is_empty()
    }
}
