//! Integration tests for the online pipeline.
//!
//! Recall, rank and filter run together over a small hand-built catalog.

use data_loader::{DataIndex, GameMaster, MasterGame, MasterStatus, User, UserProfile};
use pipeline::{FilterConfig, FilterService, RankService};
use sources::user_context::build_user_context;
use sources::{PopularityRecall, PreferenceRecall, RecallService, SimilarUserRecall};
use std::collections::HashSet;
use std::sync::Arc;

fn master(id: u64, game_type: &str, score: f64, orders: u32) -> GameMaster {
    GameMaster {
        id,
        nickname: format!("master{}", id),
        gender: None,
        age: Some(24),
        region: Some("north".to_string()),
        level: Some(3),
        score: Some(score),
        order_count: orders,
        status: MasterStatus::Online,
        price: Some(80.0),
        game_types: vec![game_type.to_string()],
        games: vec![MasterGame {
            game_id: if game_type == "moba" { 1 } else { 2 },
            game_type: Some(game_type.to_string()),
            proficiency: None,
        }],
        tags: vec!["friendly".to_string()],
        created_at: None,
        updated_at: None,
    }
}

fn create_test_setup() -> Arc<DataIndex> {
    let mut index = DataIndex::new();

    index.insert_user(User {
        id: 1,
        nickname: "player".to_string(),
        gender: None,
        age: Some(23),
        region: Some("north".to_string()),
        registered_at: None,
    });
    index.insert_profile(UserProfile {
        user_id: 1,
        game_types: vec!["moba".to_string(), "fps".to_string()],
        excluded_masters: vec![3],
        ..Default::default()
    });

    index.insert_master(master(1, "moba", 4.8, 300)); // passes everything
    index.insert_master(master(2, "moba", 4.6, 120)); // passes everything
    index.insert_master(master(3, "moba", 4.9, 400)); // excluded by the user
    index.insert_master(master(4, "fps", 3.2, 80)); // score below business threshold
    index.insert_master(master(5, "fps", 4.4, 40)); // passes everything
    let mut offline = master(6, "moba", 5.0, 500);
    offline.status = MasterStatus::Offline;
    index.insert_master(offline);
    index.insert_master(master(7, "card", 4.7, 90)); // game type not declared

    index.build_secondary_indices();
    Arc::new(index)
}

fn recall_service(index: &Arc<DataIndex>) -> RecallService {
    RecallService::new()
        .add_strategy(PreferenceRecall::new(index.clone(), 100))
        .add_strategy(SimilarUserRecall::new(index.clone()))
        .add_strategy(PopularityRecall::new(index.clone(), 50))
}

#[test]
fn test_full_pipeline() {
    let index = create_test_setup();
    let context = build_user_context(&index, 1);

    let candidates = recall_service(&index).recall(&context);
    assert!(!candidates.is_empty());

    let ranked = RankService::new(index.clone()).rank(candidates, &context);
    let shown = FilterService::new(index.clone(), &FilterConfig::default()).filter(ranked, &context);
    let ids: HashSet<_> = shown.iter().map(|c| c.master_id).collect();

    assert_eq!(ids, HashSet::from([1, 2, 5]));
    assert_eq!(ids.len(), shown.len(), "results must be distinct");
}

#[test]
fn test_game_restriction() {
    let index = create_test_setup();
    let context = build_user_context(&index, 1).with_game(Some(2));

    let candidates = recall_service(&index).recall(&context);
    let ranked = RankService::new(index.clone()).rank(candidates, &context);
    let shown = FilterService::new(index.clone(), &FilterConfig::default()).filter(ranked, &context);

    let ids: Vec<_> = shown.iter().map(|c| c.master_id).collect();
    assert_eq!(ids, vec![5]);
}

#[test]
fn test_unknown_user_still_gets_popular_masters() {
    let index = create_test_setup();
    let context = build_user_context(&index, 999);

    let candidates = recall_service(&index).recall(&context);
    let ranked = RankService::new(index.clone()).rank(candidates, &context);
    let shown = FilterService::new(index.clone(), &FilterConfig::default()).filter(ranked, &context);

    let ids: HashSet<_> = shown.iter().map(|c| c.master_id).collect();
    assert!(ids.contains(&1));
    assert!(ids.contains(&7));
    assert!(!ids.contains(&6));
    assert!(!ids.contains(&4));
}

#[test]
fn test_ranked_scores_are_non_increasing_before_rerank() {
    let index = create_test_setup();
    let context = build_user_context(&index, 1);

    let candidates = recall_service(&index).recall(&context);
    let ranked = RankService::new(index).rank(candidates, &context);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
}
