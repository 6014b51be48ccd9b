//! Helper functions to build UserContext from DataIndex
//!
//! This module aggregates the declared profile and interaction history of a
//! user into a UserContext, so recall, ranking and filtering never have to
//! re-query the DataIndex for the requester.

use crate::types::UserContext;
use data_loader::{BehaviorKind, DataIndex, PriceRange, TargetKind, UserId};
use std::collections::HashSet;

/// The declared half of a user's profile, borrowed from the DataIndex.
///
/// Profile fields win; age and region fall back to the `User` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredProfile<'a> {
    pub age: Option<u32>,
    pub region: Option<&'a str>,
    pub game_types: &'a [String],
    pub tags: &'a [String],
    pub price_range: Option<PriceRange>,
}

pub fn declared_profile(data_index: &DataIndex, user_id: UserId) -> DeclaredProfile<'_> {
    let user = data_index.get_user(user_id);
    let profile = data_index.get_profile(user_id);

    DeclaredProfile {
        age: profile
            .and_then(|p| p.age)
            .or_else(|| user.and_then(|u| u.age)),
        region: profile
            .and_then(|p| p.region.as_deref())
            .or_else(|| user.and_then(|u| u.region.as_deref())),
        game_types: profile.map(|p| p.game_types.as_slice()).unwrap_or(&[]),
        tags: profile.map(|p| p.tags.as_slice()).unwrap_or(&[]),
        price_range: profile.and_then(|p| p.price_range),
    }
}

/// Build a UserContext from DataIndex for a given user
///
/// Gathers:
/// - Declared profile (age, region, game types, tags, price band, exclusions)
/// - Masters interacted with (any behavior or order)
/// - Masters ordered from, in order of first purchase
/// - Total behavior count (used for cold-start detection)
///
/// Unknown users are not an error: the result is an empty context.
pub fn build_user_context(data_index: &DataIndex, user_id: UserId) -> UserContext {
    let mut context = UserContext::new(user_id);

    let declared = declared_profile(data_index, user_id);
    context.age = declared.age;
    context.region = declared.region.map(str::to_string);
    context.game_types = declared.game_types.to_vec();
    context.tags = declared.tags.to_vec();
    context.price_range = declared.price_range;
    if let Some(profile) = data_index.get_profile(user_id) {
        context.excluded_masters = profile.excluded_masters.iter().copied().collect();
    }

    let behaviors = data_index.get_user_behaviors(user_id);
    context.behavior_count = behaviors.len();

    let mut ordered_seen = HashSet::new();
    for order in data_index.get_user_orders(user_id) {
        context.interacted_masters.insert(order.master_id);
        if ordered_seen.insert(order.master_id) {
            context.ordered_masters.push(order.master_id);
        }
    }
    for behavior in behaviors.iter().filter(|b| b.target == TargetKind::Master) {
        context.interacted_masters.insert(behavior.target_id);
        if behavior.kind == BehaviorKind::Order && ordered_seen.insert(behavior.target_id) {
            context.ordered_masters.push(behavior.target_id);
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use data_loader::{Behavior, Order, User, UserProfile};

    fn create_test_index() -> DataIndex {
        let mut index = DataIndex::new();

        index.insert_user(User {
            id: 1,
            nickname: "neo".to_string(),
            gender: None,
            age: Some(30),
            region: Some("east".to_string()),
            registered_at: None,
        });
        index.insert_profile(UserProfile {
            user_id: 1,
            region: Some("north".to_string()),
            game_types: vec!["moba".to_string()],
            tags: vec!["chill".to_string()],
            excluded_masters: vec![9],
            ..Default::default()
        });

        let at = |day| Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        index.insert_order(Order {
            id: 1,
            user_id: 1,
            master_id: 20,
            game_id: None,
            amount: 10.0,
            rating: Some(5.0),
            created_at: at(2),
        });
        index.insert_behavior(Behavior {
            user_id: 1,
            kind: BehaviorKind::View,
            target: TargetKind::Master,
            target_id: 21,
            created_at: at(3),
        });
        index.insert_behavior(Behavior {
            user_id: 1,
            kind: BehaviorKind::Order,
            target: TargetKind::Master,
            target_id: 22,
            created_at: at(4),
        });
        index.insert_behavior(Behavior {
            user_id: 1,
            kind: BehaviorKind::View,
            target: TargetKind::Game,
            target_id: 100,
            created_at: at(5),
        });

        index
    }

    #[test]
    fn test_build_user_context_profile() {
        let index = create_test_index();
        let context = build_user_context(&index, 1);

        assert_eq!(context.user_id, 1);
        // Profile region wins over the account region, age falls back to the account
        assert_eq!(context.region.as_deref(), Some("north"));
        assert_eq!(context.age, Some(30));
        assert_eq!(context.game_types, vec!["moba".to_string()]);
        assert!(context.excluded_masters.contains(&9));
    }

    #[test]
    fn test_build_user_context_history() {
        let index = create_test_index();
        let context = build_user_context(&index, 1);

        assert_eq!(context.behavior_count, 3);
        assert_eq!(context.ordered_masters, vec![20, 22]);
        assert_eq!(context.interacted_masters.len(), 3);
        assert!(context.interacted_masters.contains(&21));
        assert!(!context.interacted_masters.contains(&100));
    }

    #[test]
    fn test_unknown_user_gets_empty_context() {
        let index = DataIndex::new();
        let context = build_user_context(&index, 999);

        assert_eq!(context.user_id, 999);
        assert!(!context.has_history());
        assert!(context.game_types.is_empty());
        assert!(context.region.is_none());
    }
}
