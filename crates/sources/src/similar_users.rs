//! Similar-user recall.
//!
//! "Users who look like you booked these masters."
//!
//! ## Algorithm
//! 1. Score every other user's declared profile against the requester's
//!    (region, age, game types, tags)
//! 2. Keep users above the similarity threshold, strongest first
//! 3. From each similar user take a few online masters: the ones they ordered
//!    from first, then masters of the game types they play
//! 4. A candidate's recall score is the similarity of the user who brought it

use crate::recall::RecallStrategy;
use crate::types::{Candidate, CandidateSource, UserContext};
use crate::user_context::{DeclaredProfile, declared_profile};
use anyhow::Result;
use data_loader::{DataIndex, MasterId, UserId};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct SimilarUserRecall {
    /// Shared reference to the data index (read-only, so no Mutex needed)
    data_index: Arc<DataIndex>,

    /// Similarity a user must exceed to count as similar
    threshold: f64,

    /// Number of similar users consulted
    max_users: usize,

    /// Masters taken from each similar user
    masters_per_user: usize,
}

impl SimilarUserRecall {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        Self {
            data_index,
            threshold: 0.3,
            max_users: 10,
            masters_per_user: 5,
        }
    }

    /// Configure the similarity threshold (default: 0.3)
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Configure the number of similar users consulted (default: 10)
    pub fn with_max_users(mut self, max: usize) -> Self {
        self.max_users = max;
        self
    }

    /// Configure masters taken per similar user (default: 5)
    pub fn with_masters_per_user(mut self, n: usize) -> Self {
        self.masters_per_user = n;
        self
    }

    /// Find users similar to the requester, strongest first
    fn find_similar_users(&self, context: &UserContext) -> Vec<(UserId, f64)> {
        let requester = DeclaredProfile {
            age: context.age,
            region: context.region.as_deref(),
            game_types: &context.game_types,
            tags: &context.tags,
            price_range: context.price_range,
        };

        let mut similar = self
            .data_index
            .all_user_ids()
            .par_iter()
            .fold(Vec::new, |mut local, &other_id| {
                if other_id != context.user_id {
                    let other = declared_profile(&self.data_index, other_id);
                    let similarity = profile_similarity(&requester, &other);
                    if similarity > self.threshold {
                        local.push((other_id, similarity));
                    }
                }
                local
            })
            .reduce(Vec::new, |mut acc, local| {
                acc.extend(local);
                acc
            });

        // Strongest first, ties by ascending user ID
        similar.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        similar.truncate(self.max_users);
        similar
    }

    /// Online masters a similar user would lead us to
    fn masters_from(&self, user_id: UserId, context: &UserContext) -> Vec<MasterId> {
        let ordered = self.data_index.get_user_orders(user_id).iter().map(|o| o.master_id);
        let by_type = declared_profile(&self.data_index, user_id)
            .game_types
            .iter()
            .flat_map(|t| self.data_index.get_masters_by_game_type(t).iter().copied());

        let mut seen = HashSet::new();
        ordered
            .chain(by_type)
            .filter(|id| !context.excluded_masters.contains(id))
            .filter(|id| {
                self.data_index
                    .get_master(*id)
                    .is_some_and(|m| m.is_online())
            })
            .filter(|id| seen.insert(*id))
            .take(self.masters_per_user)
            .collect()
    }
}

/// Similarity of two declared profiles, in [0, 1]
///
/// region 0.2, age up to 0.2, game-type overlap 0.4, tag overlap 0.2
pub fn profile_similarity(a: &DeclaredProfile<'_>, b: &DeclaredProfile<'_>) -> f64 {
    let mut similarity = 0.0;

    if let (Some(ra), Some(rb)) = (a.region, b.region) {
        if ra == rb {
            similarity += 0.2;
        }
    }

    if let (Some(aa), Some(ab)) = (a.age, b.age) {
        let diff = (aa as f64 - ab as f64).abs();
        similarity += (0.2 - diff / 20.0).max(0.0);
    }

    similarity += overlap_ratio(a.game_types, b.game_types) * 0.4;
    similarity += overlap_ratio(a.tags, b.tags) * 0.2;

    similarity.min(1.0)
}

/// |a ∩ b| / max(|a|, |b|), 0 when either side is empty
fn overlap_ratio(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.iter().filter(|x| b.contains(x)).count();
    shared as f64 / a.len().max(b.len()) as f64
}

impl RecallStrategy for SimilarUserRecall {
    fn name(&self) -> &str {
        "similar_users"
    }

    #[instrument(skip(self, context), fields(user_id = context.user_id))]
    fn recall(&self, context: &UserContext) -> Result<Vec<Candidate>> {
        let similar_users = self.find_similar_users(context);
        debug!("Found {} similar users", similar_users.len());

        let mut seen = HashSet::new();
        let candidates: Vec<Candidate> = similar_users
            .iter()
            .flat_map(|&(user_id, similarity)| {
                self.masters_from(user_id, context)
                    .into_iter()
                    .map(move |id| (id, similarity))
            })
            .filter(|(id, _)| seen.insert(*id))
            .map(|(id, similarity)| Candidate::new(id, CandidateSource::SimilarUsers, similarity))
            .collect();

        debug!("Similar-user recall found {} candidates", candidates.len());
        Ok(candidates)
    }
}
