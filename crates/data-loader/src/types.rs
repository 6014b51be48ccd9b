//! Core domain types for the companion marketplace.
//!
//! This module defines the fundamental data structures used throughout the system:
//! users and their declared profiles, game masters (companions), games, tags,
//! and the interaction history (behaviors and orders) that every recommendation
//! signal is derived from.
//!
//! Key Rust concepts demonstrated here:
//! - Type aliases for domain clarity (UserId, MasterId, GameId)
//! - Structs with public fields and `#[serde(default)]` for sparse records
//! - Enums for fixed sets of values
//! - HashMap indices with slice-returning getters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with master IDs

/// Unique identifier for a user
pub type UserId = u64;

/// Unique identifier for a game master (companion)
pub type MasterId = u64;

/// Unique identifier for a game
pub type GameId = u64;

/// Unique identifier for a tag
pub type TagId = u64;

/// Unique identifier for an order
pub type OrderId = u64;

// =============================================================================
// User-related Types
// =============================================================================

/// A registered user of the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Inclusive price band a user is willing to pay per session.
///
/// Either bound may be missing, which leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl PriceRange {
    /// Whether `price` falls inside the band
    pub fn contains(&self, price: f64) -> bool {
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

/// Declared preferences of a user.
///
/// Profiles are optional: a user without one falls back to the age and region
/// on the `User` record and declares no game types or tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub region: Option<String>,
    /// Game types the user plays (e.g. "moba", "fps")
    #[serde(default)]
    pub game_types: Vec<String>,
    /// Free-form interest tags
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub price_range: Option<PriceRange>,
    /// Masters the user never wants to see again
    #[serde(default)]
    pub excluded_masters: Vec<MasterId>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Master-related Types
// =============================================================================

/// Availability of a master on the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasterStatus {
    Online,
    #[default]
    Offline,
    /// Blocked by platform policy; never recommended
    Suspended,
}

/// One game a master offers sessions for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterGame {
    pub game_id: GameId,
    #[serde(default)]
    pub game_type: Option<String>,
    /// Self-declared skill level in [0, 1]
    #[serde(default)]
    pub proficiency: Option<f64>,
}

/// A game companion offering paid play sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMaster {
    pub id: MasterId,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    /// Average customer rating in [0, 5]
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub order_count: u32,
    #[serde(default)]
    pub status: MasterStatus,
    /// Price per session
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub game_types: Vec<String>,
    #[serde(default)]
    pub games: Vec<MasterGame>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl GameMaster {
    pub fn is_online(&self) -> bool {
        self.status == MasterStatus::Online
    }

    /// The category used to detect near-duplicates in a ranked list
    pub fn primary_category(&self) -> Option<&str> {
        self.game_types.first().map(String::as_str)
    }

    pub fn offers_game(&self, game_id: GameId) -> bool {
        self.games.iter().any(|g| g.game_id == game_id)
    }
}

// =============================================================================
// Game and Tag Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    #[serde(default)]
    pub game_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Editorial base weight; 1.0 when missing
    #[serde(default)]
    pub weight: Option<f64>,
}

/// How a tag came to be attached to a user or master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    /// Assigned automatically by the platform
    System,
    /// Inferred from interaction history
    Behavior,
    /// Set explicitly by the owner
    Manual,
}

/// Attachment of a tag to a user or a master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagLink {
    pub entity_id: u64,
    pub tag_id: TagId,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub source: Option<TagSource>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameTag {
    pub game_id: GameId,
    pub tag_id: TagId,
}

// =============================================================================
// Interaction Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    View,
    Favorite,
    Order,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Master,
    Game,
}

/// A single user interaction with a master or a game
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Behavior {
    pub user_id: UserId,
    pub kind: BehaviorKind,
    pub target: TargetKind,
    pub target_id: u64,
    pub created_at: DateTime<Utc>,
}

/// A completed, paid session
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub master_id: MasterId,
    #[serde(default)]
    pub game_id: Option<GameId>,
    #[serde(default)]
    pub amount: f64,
    /// Customer rating in [0, 5], if the customer left one
    #[serde(default)]
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Dataset metadata and counts
// =============================================================================

/// Optional `meta.json` contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetMeta {
    /// Reference instant for every time-dependent computation
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetCounts {
    pub users: usize,
    pub masters: usize,
    pub games: usize,
    pub behaviors: usize,
    pub orders: usize,
}

impl fmt::Display for DatasetCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} masters, {} games, {} behaviors, {} orders",
            self.users, self.masters, self.games, self.behaviors, self.orders
        )
    }
}

// =============================================================================
// DataIndex - The Core In-Memory Store
// =============================================================================

/// Main data structure that holds all entities, interaction history and indices.
///
/// Lookups never fail: a missing entity is `None` and a missing history is an
/// empty slice, so callers can treat absence as a neutral default.
#[derive(Debug)]
pub struct DataIndex {
    // Primary data stores
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) profiles: HashMap<UserId, UserProfile>,
    pub(crate) masters: HashMap<MasterId, GameMaster>,
    pub(crate) games: HashMap<GameId, Game>,
    pub(crate) tags: HashMap<TagId, Tag>,

    // Tag attachments
    pub(crate) user_tags: HashMap<UserId, Vec<TagLink>>,
    pub(crate) master_tags: HashMap<MasterId, Vec<TagLink>>,
    pub(crate) game_tags: HashMap<GameId, Vec<TagId>>,

    // Interaction history
    pub(crate) user_behaviors: HashMap<UserId, Vec<Behavior>>,
    pub(crate) user_orders: HashMap<UserId, Vec<Order>>,
    pub(crate) master_orders: HashMap<MasterId, Vec<Order>>,
    pub(crate) game_orders: HashMap<GameId, Vec<Order>>,

    // Secondary indices, rebuilt by `build_secondary_indices`
    pub(crate) masters_by_game: HashMap<GameId, Vec<MasterId>>,
    pub(crate) masters_by_game_type: HashMap<String, Vec<MasterId>>,
    pub(crate) tag_usage: HashMap<TagId, usize>,

    pub(crate) as_of: Option<DateTime<Utc>>,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            profiles: HashMap::new(),
            masters: HashMap::new(),
            games: HashMap::new(),
            tags: HashMap::new(),
            user_tags: HashMap::new(),
            master_tags: HashMap::new(),
            game_tags: HashMap::new(),
            user_behaviors: HashMap::new(),
            user_orders: HashMap::new(),
            master_orders: HashMap::new(),
            game_orders: HashMap::new(),
            masters_by_game: HashMap::new(),
            masters_by_game_type: HashMap::new(),
            tag_usage: HashMap::new(),
            as_of: None,
        }
    }

    // Getters - these return references (&T) not owned values (T)

    pub fn get_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn get_profile(&self, user_id: UserId) -> Option<&UserProfile> {
        self.profiles.get(&user_id)
    }

    pub fn get_master(&self, id: MasterId) -> Option<&GameMaster> {
        self.masters.get(&id)
    }

    pub fn get_game(&self, id: GameId) -> Option<&Game> {
        self.games.get(&id)
    }

    pub fn get_tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    pub fn get_user_tags(&self, user_id: UserId) -> &[TagLink] {
        self.user_tags
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_master_tags(&self, master_id: MasterId) -> &[TagLink] {
        self.master_tags
            .get(&master_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_game_tags(&self, game_id: GameId) -> &[TagId] {
        self.game_tags
            .get(&game_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All behaviors of a user, in insertion order
    pub fn get_user_behaviors(&self, user_id: UserId) -> &[Behavior] {
        self.user_behaviors
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_user_orders(&self, user_id: UserId) -> &[Order] {
        self.user_orders
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_master_orders(&self, master_id: MasterId) -> &[Order] {
        self.master_orders
            .get(&master_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_game_orders(&self, game_id: GameId) -> &[Order] {
        self.game_orders
            .get(&game_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Masters offering a game, sorted by ID
    pub fn get_masters_for_game(&self, game_id: GameId) -> &[MasterId] {
        self.masters_by_game
            .get(&game_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Masters listing a game type, sorted by ID
    pub fn get_masters_by_game_type(&self, game_type: &str) -> &[MasterId] {
        self.masters_by_game_type
            .get(game_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of users, masters and games a tag is attached to
    pub fn tag_usage(&self, tag_id: TagId) -> usize {
        self.tag_usage.get(&tag_id).copied().unwrap_or(0)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// User IDs in ascending order
    pub fn all_user_ids(&self) -> Vec<UserId> {
        sorted_keys(&self.users)
    }

    /// Master IDs in ascending order
    pub fn all_master_ids(&self) -> Vec<MasterId> {
        sorted_keys(&self.masters)
    }

    /// Game IDs in ascending order
    pub fn all_game_ids(&self) -> Vec<GameId> {
        sorted_keys(&self.games)
    }

    /// Mean number of orders per game across the catalog (0.0 when empty)
    pub fn mean_orders_per_game(&self) -> f64 {
        if self.games.is_empty() {
            return 0.0;
        }
        let total: usize = self
            .games
            .keys()
            .map(|id| self.get_game_orders(*id).len())
            .sum();
        total as f64 / self.games.len() as f64
    }

    /// Time of the most recent order a master received
    pub fn last_order_at(&self, master_id: MasterId) -> Option<DateTime<Utc>> {
        self.get_master_orders(master_id)
            .iter()
            .map(|o| o.created_at)
            .max()
    }

    // Reference time

    /// The instant "now" means for this dataset.
    ///
    /// Set explicitly from `meta.json`, otherwise the latest timestamp seen by
    /// `build_secondary_indices`. Falls back to the Unix epoch for an empty index.
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn set_as_of(&mut self, as_of: DateTime<Utc>) {
        self.as_of = Some(as_of);
    }

    /// Whole and fractional days from `t` to `as_of`, never negative
    pub fn days_since(&self, t: DateTime<Utc>) -> f64 {
        ((self.as_of() - t).num_seconds() as f64 / 86_400.0).max(0.0)
    }

    /// Hours from `t` to `as_of`, never negative
    pub fn hours_since(&self, t: DateTime<Utc>) -> f64 {
        ((self.as_of() - t).num_seconds() as f64 / 3_600.0).max(0.0)
    }

    // Mutators - used during data loading and by test fixtures

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_profile(&mut self, profile: UserProfile) {
        self.profiles.insert(profile.user_id, profile);
    }

    pub fn insert_master(&mut self, master: GameMaster) {
        self.masters.insert(master.id, master);
    }

    pub fn insert_game(&mut self, game: Game) {
        self.games.insert(game.id, game);
    }

    pub fn insert_tag(&mut self, tag: Tag) {
        self.tags.insert(tag.id, tag);
    }

    pub fn insert_user_tag(&mut self, link: TagLink) {
        self.user_tags.entry(link.entity_id).or_default().push(link);
    }

    pub fn insert_master_tag(&mut self, link: TagLink) {
        self.master_tags.entry(link.entity_id).or_default().push(link);
    }

    pub fn insert_game_tag(&mut self, game_tag: GameTag) {
        let tags = self.game_tags.entry(game_tag.game_id).or_default();
        if !tags.contains(&game_tag.tag_id) {
            tags.push(game_tag.tag_id);
        }
    }

    pub fn insert_behavior(&mut self, behavior: Behavior) {
        self.user_behaviors
            .entry(behavior.user_id)
            .or_default()
            .push(behavior);
    }

    /// Insert an order and update the per-user, per-master and per-game indices
    pub fn insert_order(&mut self, order: Order) {
        self.user_orders.entry(order.user_id).or_default().push(order);
        self.master_orders
            .entry(order.master_id)
            .or_default()
            .push(order);
        if let Some(game_id) = order.game_id {
            self.game_orders.entry(game_id).or_default().push(order);
        }
    }

    /// Get counts for debugging/validation
    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            users: self.users.len(),
            masters: self.masters.len(),
            games: self.games.len(),
            behaviors: self.user_behaviors.values().map(|v| v.len()).sum(),
            orders: self.user_orders.values().map(|v| v.len()).sum(),
        }
    }
}

impl Default for DataIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_keys<V>(map: &HashMap<u64, V>) -> Vec<u64> {
    let mut ids: Vec<u64> = map.keys().copied().collect();
    ids.sort_unstable();
    ids
}
