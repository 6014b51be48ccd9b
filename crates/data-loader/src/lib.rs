//! # Data Loader Crate
//!
//! This crate loads and indexes the companion marketplace dataset: users,
//! their declared profiles, game masters, games, tags, and the behavior and
//! order history every recommendation signal is derived from.
//!
//! ## Main Components
//!
//! - **types**: Core domain types and the `DataIndex` in-memory store
//! - **parser**: Decode the JSON dataset files
//! - **index**: Build secondary indices and validate integrity
//! - **source**: The `DataSource` seam the engine loads through
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataSource, JsonDirSource};
//!
//! let index = JsonDirSource::new("data/sample").load()?;
//!
//! let master = index.get_master(10);
//! let orders = index.get_user_orders(1);
//! println!("User 1 placed {} orders", orders.len());
//! ```

// Public modules
pub mod error;
pub mod index;
pub mod parser;
pub mod source;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use source::{DataSource, JsonDirSource};
pub use types::{
    // Type aliases
    GameId,
    MasterId,
    OrderId,
    TagId,
    UserId,
    // Core types
    Behavior,
    DataIndex,
    DatasetCounts,
    DatasetMeta,
    Game,
    GameMaster,
    GameTag,
    MasterGame,
    Order,
    PriceRange,
    Tag,
    TagLink,
    User,
    UserProfile,
    // Enums
    BehaviorKind,
    Gender,
    MasterStatus,
    TagSource,
    TargetKind,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn master(id: MasterId) -> GameMaster {
        GameMaster {
            id,
            nickname: format!("m{}", id),
            gender: None,
            age: None,
            region: None,
            level: None,
            score: Some(4.5),
            order_count: 12,
            status: MasterStatus::Online,
            price: Some(30.0),
            game_types: vec!["moba".to_string()],
            games: vec![MasterGame {
                game_id: 1,
                game_type: Some("moba".to_string()),
                proficiency: None,
            }],
            tags: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_data_index_creation() {
        let index = DataIndex::new();
        assert_eq!(index.counts(), DatasetCounts::default());
    }

    #[test]
    fn test_insert_master() {
        let mut index = DataIndex::new();
        index.insert_master(master(7));

        let retrieved = index.get_master(7).unwrap();
        assert_eq!(retrieved.id, 7);
        assert!(retrieved.is_online());
        assert_eq!(retrieved.primary_category(), Some("moba"));
    }

    #[test]
    fn test_insert_order_updates_all_indices() {
        let mut index = DataIndex::new();
        index.insert_order(Order {
            id: 1,
            user_id: 3,
            master_id: 7,
            game_id: Some(1),
            amount: 20.0,
            rating: Some(5.0),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        });

        assert_eq!(index.get_user_orders(3).len(), 1);
        assert_eq!(index.get_master_orders(7).len(), 1);
        assert_eq!(index.get_game_orders(1).len(), 1);
        assert_eq!(
            index.last_order_at(7),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_all_ids_are_sorted() {
        let mut index = DataIndex::new();
        for id in [5, 1, 3] {
            index.insert_master(master(id));
        }
        assert_eq!(index.all_master_ids(), vec![1, 3, 5]);
    }

    #[test]
    fn test_price_range_bounds() {
        let band = PriceRange {
            min: Some(10.0),
            max: None,
        };
        assert!(band.contains(10.0));
        assert!(band.contains(1_000.0));
        assert!(!band.contains(9.99));
    }

    #[test]
    fn test_empty_queries() {
        let index = DataIndex::new();

        // Querying non-existent data should return None or empty slices
        assert!(index.get_user(999).is_none());
        assert!(index.get_master(999).is_none());
        assert!(index.get_user_behaviors(999).is_empty());
        assert!(index.get_master_orders(999).is_empty());
        assert!(index.get_masters_for_game(999).is_empty());
        assert_eq!(index.tag_usage(999), 0);
        assert_eq!(index.mean_orders_per_game(), 0.0);
    }
}
