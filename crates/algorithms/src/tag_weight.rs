//! Tag weights for content-based matching.
//!
//! ## Formula
//! A raw weight is a product of factors, then squashed into [0, 1) with
//! `1 − e^(−w)`:
//!
//! ```text
//! user   w = base · source · decay · (1 + behavior)    · idf · link
//! master w = base · source · decay · (1 + order_share) · idf · link
//! game   w = base · popularity · idf
//! ```
//!
//! - base: the tag's own weight, or 1
//! - source: system 0.8, behavior 1.2, manual 1.5, unknown 1.0
//! - decay: half-life of 30 days on the link's `updated_at`, 0.5 if undated
//! - behavior: kind-weighted, decayed count of the user's interactions with
//!   targets carrying the tag
//! - order_share: fraction of the master's orders placed for games carrying
//!   the tag
//! - popularity: `0.5 + 0.5·ln(1 + orders / mean orders per game)`
//! - idf: `0.5 + 0.5·ln(N/freq)/ln(N)` over all users, masters and games
//! - link: the link's own weight, or 1
//!
//! A tag linked twice to the same entity keeps the larger weight.

use chrono::{DateTime, Utc};
use data_loader::{
    BehaviorKind, DataIndex, GameId, MasterId, TagId, TagLink, TagSource, TargetKind, UserId,
};
use std::collections::BTreeMap;
use std::f64::consts::LN_2;
use std::sync::Arc;

/// Sparse tag → weight map; ordered so float sums are reproducible
pub type TagWeights = BTreeMap<TagId, f64>;

const DECAY_HALF_LIFE_DAYS: f64 = 30.0;
const UNDATED_DECAY: f64 = 0.5;

pub fn source_factor(source: Option<TagSource>) -> f64 {
    match source {
        Some(TagSource::System) => 0.8,
        Some(TagSource::Behavior) => 1.2,
        Some(TagSource::Manual) => 1.5,
        None => 1.0,
    }
}

fn behavior_kind_weight(kind: BehaviorKind) -> f64 {
    match kind {
        BehaviorKind::View => 0.2,
        BehaviorKind::Favorite => 0.5,
        BehaviorKind::Order => 1.0,
        BehaviorKind::Other => 0.1,
    }
}

/// NaN passes through so training can reject it as a non-finite feature
fn squash(raw: f64) -> f64 {
    (1.0 - (-raw).exp()).clamp(0.0, 1.0)
}

#[derive(Clone)]
pub struct TagWeigher {
    data: Arc<DataIndex>,
    /// Users + masters + games: the document count for idf
    universe: usize,
    mean_game_orders: f64,
}

impl TagWeigher {
    pub fn new(data: Arc<DataIndex>) -> Self {
        let counts = data.counts();
        let universe = counts.users + counts.masters + counts.games;
        let mean_game_orders = data.mean_orders_per_game();
        Self {
            data,
            universe,
            mean_game_orders,
        }
    }

    pub fn user_weights(&self, user_id: UserId) -> TagWeights {
        self.link_weights(self.data.get_user_tags(user_id), |tag_id| {
            1.0 + self.behavior_affinity(user_id, tag_id)
        })
    }

    pub fn master_weights(&self, master_id: MasterId) -> TagWeights {
        self.link_weights(self.data.get_master_tags(master_id), |tag_id| {
            1.0 + self.order_share(master_id, tag_id)
        })
    }

    pub fn game_weights(&self, game_id: GameId) -> TagWeights {
        let popularity = self.game_popularity(game_id);
        let mut weights = TagWeights::new();
        for &tag_id in self.data.get_game_tags(game_id) {
            let raw = self.base(tag_id) * popularity * self.idf(tag_id);
            keep_max(&mut weights, tag_id, squash(raw));
        }
        weights
    }

    fn link_weights(&self, links: &[TagLink], activity: impl Fn(TagId) -> f64) -> TagWeights {
        let mut weights = TagWeights::new();
        for link in links {
            let raw = self.base(link.tag_id)
                * source_factor(link.source)
                * self.decay(link.updated_at)
                * activity(link.tag_id)
                * self.idf(link.tag_id)
                * link.weight.unwrap_or(1.0);
            keep_max(&mut weights, link.tag_id, squash(raw));
        }
        weights
    }

    fn base(&self, tag_id: TagId) -> f64 {
        self.data
            .get_tag(tag_id)
            .and_then(|t| t.weight)
            .unwrap_or(1.0)
    }

    fn decay(&self, at: Option<DateTime<Utc>>) -> f64 {
        match at {
            Some(t) => (-LN_2 * self.data.days_since(t) / DECAY_HALF_LIFE_DAYS).exp(),
            None => UNDATED_DECAY,
        }
    }

    /// Rare tags say more about an entity than ubiquitous ones
    pub fn idf(&self, tag_id: TagId) -> f64 {
        let freq = self.data.tag_usage(tag_id);
        if freq == 0 || self.universe <= 1 {
            return 1.0;
        }
        let n = self.universe as f64;
        (0.5 + 0.5 * (n / freq as f64).ln() / n.ln()).clamp(0.0, 1.0)
    }

    fn target_has_tag(&self, target: TargetKind, target_id: u64, tag_id: TagId) -> bool {
        match target {
            TargetKind::Master => self
                .data
                .get_master_tags(target_id)
                .iter()
                .any(|l| l.tag_id == tag_id),
            TargetKind::Game => self.data.get_game_tags(target_id).contains(&tag_id),
        }
    }

    fn behavior_affinity(&self, user_id: UserId, tag_id: TagId) -> f64 {
        self.data
            .get_user_behaviors(user_id)
            .iter()
            .filter(|b| self.target_has_tag(b.target, b.target_id, tag_id))
            .map(|b| behavior_kind_weight(b.kind) * self.decay(Some(b.created_at)))
            .sum()
    }

    fn order_share(&self, master_id: MasterId, tag_id: TagId) -> f64 {
        let orders = self.data.get_master_orders(master_id);
        if orders.is_empty() {
            return 0.0;
        }
        let tagged = orders
            .iter()
            .filter(|o| {
                o.game_id
                    .is_some_and(|g| self.data.get_game_tags(g).contains(&tag_id))
            })
            .count();
        tagged as f64 / orders.len() as f64
    }

    fn game_popularity(&self, game_id: GameId) -> f64 {
        if self.mean_game_orders <= 0.0 {
            return 0.5;
        }
        let orders = self.data.get_game_orders(game_id).len() as f64;
        0.5 + 0.5 * (1.0 + orders / self.mean_game_orders).ln()
    }
}

fn keep_max(weights: &mut TagWeights, tag_id: TagId, weight: f64) {
    weights
        .entry(tag_id)
        .and_modify(|w| {
            if weight > *w {
                *w = weight;
            }
        })
        .or_insert(weight);
}
