//! Implicit rating estimates from interaction history.
//!
//! ## Estimate
//! - Explicit: the mean of the user's order ratings for the item
//! - Implicit: `min(5, 0.5·views + 1.5·favorites + 3·orders + 0.2·other)`
//!
//! `orders` is the larger of the order-record count and the count of `order`
//! behaviors, since platforms usually log both for one purchase.

use chrono::{DateTime, Utc};
use data_loader::{BehaviorKind, DataIndex, GameId, MasterId, TargetKind, UserId};
use std::collections::HashMap;

const VIEW_WEIGHT: f64 = 0.5;
const FAVORITE_WEIGHT: f64 = 1.5;
const ORDER_WEIGHT: f64 = 3.0;
const OTHER_WEIGHT: f64 = 0.2;
const MAX_RATING: f64 = 5.0;

/// Interaction counts for one (user, item) pair
#[derive(Debug, Clone, Default)]
struct Tally {
    views: u32,
    favorites: u32,
    order_behaviors: u32,
    other: u32,
    order_records: u32,
    ratings: Vec<f64>,
}

impl Tally {
    fn record(&mut self, kind: BehaviorKind) {
        match kind {
            BehaviorKind::View => self.views += 1,
            BehaviorKind::Favorite => self.favorites += 1,
            BehaviorKind::Order => self.order_behaviors += 1,
            BehaviorKind::Other => self.other += 1,
        }
    }

    fn estimate(&self) -> f64 {
        if !self.ratings.is_empty() {
            return self.ratings.iter().sum::<f64>() / self.ratings.len() as f64;
        }
        let orders = self.order_records.max(self.order_behaviors) as f64;
        (VIEW_WEIGHT * self.views as f64
            + FAVORITE_WEIGHT * self.favorites as f64
            + ORDER_WEIGHT * orders
            + OTHER_WEIGHT * self.other as f64)
            .min(MAX_RATING)
    }
}

enum Event {
    Order { rating: Option<f64> },
    Behavior(BehaviorKind),
}

/// Fold timestamped events into per-item estimates, in first-interaction order.
///
/// Items whose estimate is not positive are left out of the history.
fn estimates(mut events: Vec<(DateTime<Utc>, u64, Event)>) -> Vec<(u64, f64)> {
    // Stable: simultaneous events keep their collection order
    events.sort_by_key(|(at, _, _)| *at);

    let mut positions: HashMap<u64, usize> = HashMap::new();
    let mut tallies: Vec<(u64, Tally)> = Vec::new();
    for (_, id, event) in events {
        let index = *positions.entry(id).or_insert_with(|| {
            tallies.push((id, Tally::default()));
            tallies.len() - 1
        });
        let tally = &mut tallies[index].1;
        match event {
            Event::Order { rating } => {
                tally.order_records += 1;
                if let Some(r) = rating {
                    tally.ratings.push(r);
                }
            }
            Event::Behavior(kind) => tally.record(kind),
        }
    }

    tallies
        .into_iter()
        .map(|(id, tally)| (id, tally.estimate()))
        .filter(|(_, estimate)| estimate.is_nan() || *estimate > 0.0)
        .collect()
}

/// Masters a user interacted with and the estimated rating of each.
///
/// Non-finite estimates are kept so training can reject them.
pub fn master_ratings(data: &DataIndex, user_id: UserId) -> Vec<(MasterId, f64)> {
    let orders = data.get_user_orders(user_id).iter().map(|o| {
        (o.created_at, o.master_id, Event::Order { rating: o.rating })
    });
    let behaviors = data
        .get_user_behaviors(user_id)
        .iter()
        .filter(|b| b.target == TargetKind::Master)
        .map(|b| (b.created_at, b.target_id, Event::Behavior(b.kind)));

    estimates(orders.chain(behaviors).collect())
}

/// Games a user interacted with and the estimated rating of each.
///
/// Orders count toward the game they were placed for.
pub fn game_ratings(data: &DataIndex, user_id: UserId) -> Vec<(GameId, f64)> {
    let orders = data.get_user_orders(user_id).iter().filter_map(|o| {
        o.game_id
            .map(|game_id| (o.created_at, game_id, Event::Order { rating: o.rating }))
    });
    let behaviors = data
        .get_user_behaviors(user_id)
        .iter()
        .filter(|b| b.target == TargetKind::Game)
        .map(|b| (b.created_at, b.target_id, Event::Behavior(b.kind)));

    estimates(orders.chain(behaviors).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{at, behavior, build_index, order, order_for_game};

    #[test]
    fn test_explicit_rating_wins() {
        let mut index = build_index();
        order(&mut index, 1, 1, 10, Some(4.0), at(1));
        order(&mut index, 2, 1, 10, Some(5.0), at(2));
        behavior(&mut index, 1, BehaviorKind::View, TargetKind::Master, 10, at(3));

        assert_eq!(master_ratings(&index, 1), vec![(10, 4.5)]);
    }

    #[test]
    fn test_implicit_rating_is_capped() {
        let mut index = build_index();
        behavior(&mut index, 1, BehaviorKind::View, TargetKind::Master, 10, at(1));
        behavior(&mut index, 1, BehaviorKind::Favorite, TargetKind::Master, 10, at(2));
        for day in 3..6 {
            behavior(&mut index, 1, BehaviorKind::Order, TargetKind::Master, 11, at(day));
        }

        let ratings = master_ratings(&index, 1);
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0], (10, 2.0));
        assert_eq!(ratings[1], (11, 5.0));
    }

    #[test]
    fn test_history_follows_first_interaction() {
        let mut index = build_index();
        behavior(&mut index, 1, BehaviorKind::View, TargetKind::Master, 30, at(5));
        order(&mut index, 1, 1, 20, None, at(1));
        behavior(&mut index, 1, BehaviorKind::View, TargetKind::Master, 20, at(9));

        let ids: Vec<_> = master_ratings(&index, 1).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![20, 30]);
    }

    #[test]
    fn test_game_ratings_from_orders_and_behaviors() {
        let mut index = build_index();
        order_for_game(&mut index, 1, 1, 10, 7, Some(3.0), at(1));
        behavior(&mut index, 1, BehaviorKind::Favorite, TargetKind::Game, 8, at(2));

        assert_eq!(game_ratings(&index, 1), vec![(7, 3.0), (8, 1.5)]);
    }

    #[test]
    fn test_unknown_user_has_no_history() {
        let index = build_index();
        assert!(master_ratings(&index, 42).is_empty());
        assert!(game_ratings(&index, 42).is_empty());
    }
}
