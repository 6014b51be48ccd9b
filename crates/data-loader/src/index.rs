//! DataIndex building and indexing logic.
//!
//! This module builds the DataIndex from parsed data:
//! - Parse the dataset files (the three entity files in parallel)
//! - Create primary stores and the interaction history
//! - Build secondary indices (masters by game, masters by game type, tag usage)
//! - Validate referential integrity and value ranges

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use std::path::Path;
use tracing::info;

/// Optional history files, parsed together after the entity files
struct History {
    profiles: Vec<UserProfile>,
    tags: Vec<Tag>,
    user_tags: Vec<TagLink>,
    master_tags: Vec<TagLink>,
    game_tags: Vec<GameTag>,
    behaviors: Vec<Behavior>,
    orders: Vec<Order>,
    meta: DatasetMeta,
}

fn parse_history(data_dir: &Path) -> Result<History> {
    Ok(History {
        profiles: parser::parse_optional_file(&data_dir.join("profiles.json"))?,
        tags: parser::parse_optional_file(&data_dir.join("tags.json"))?,
        user_tags: parser::parse_optional_file(&data_dir.join("user_tags.json"))?,
        master_tags: parser::parse_optional_file(&data_dir.join("master_tags.json"))?,
        game_tags: parser::parse_optional_file(&data_dir.join("game_tags.json"))?,
        behaviors: parser::parse_optional_file(&data_dir.join("behaviors.json"))?,
        orders: parser::parse_optional_file(&data_dir.join("orders.json"))?,
        meta: parser::parse_meta(&data_dir.join("meta.json"))?,
    })
}

impl DataIndex {
    /// Load a complete dataset from a directory of JSON files
    ///
    /// Steps:
    /// 1. Parse users, masters and games in parallel, history alongside them
    /// 2. Build primary stores and history indices
    /// 3. Build secondary indices
    /// 4. Validate data integrity
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        info!("Loading companion dataset from {:?}", data_dir);

        // Rayon's `join` runs two closures in parallel; nesting gives four-way parallelism
        let ((users, masters), (games, history)) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_users(&data_dir.join("users.json")),
                    || parser::parse_masters(&data_dir.join("masters.json")),
                )
            },
            || {
                rayon::join(
                    || parser::parse_games(&data_dir.join("games.json")),
                    || parse_history(data_dir),
                )
            },
        );

        let users = users?;
        let masters = masters?;
        let games = games?;
        let history = history?;

        let mut index = DataIndex::new();
        users.into_iter().for_each(|u| index.insert_user(u));
        masters.into_iter().for_each(|m| index.insert_master(m));
        games.into_iter().for_each(|g| index.insert_game(g));
        history.profiles.into_iter().for_each(|p| index.insert_profile(p));
        history.tags.into_iter().for_each(|t| index.insert_tag(t));
        history.user_tags.into_iter().for_each(|l| index.insert_user_tag(l));
        history.master_tags.into_iter().for_each(|l| index.insert_master_tag(l));
        history.game_tags.into_iter().for_each(|t| index.insert_game_tag(t));
        history.behaviors.into_iter().for_each(|b| index.insert_behavior(b));
        history.orders.into_iter().for_each(|o| index.insert_order(o));
        if let Some(as_of) = history.meta.as_of {
            index.set_as_of(as_of);
        }

        index.build_secondary_indices();
        index.validate()?;

        info!("Loaded {} (as of {})", index.counts(), index.as_of());
        Ok(index)
    }

    /// Build secondary indices after primary data is loaded
    ///
    /// Rebuilds from scratch, so it is safe to call again after more inserts.
    /// Master lists are filled in ascending ID order.
    pub fn build_secondary_indices(&mut self) {
        self.masters_by_game.clear();
        self.masters_by_game_type.clear();
        self.tag_usage.clear();

        for master_id in self.all_master_ids() {
            let Some(master) = self.masters.get(&master_id) else {
                continue;
            };
            for game in &master.games {
                let list = self.masters_by_game.entry(game.game_id).or_default();
                if list.last() != Some(&master_id) {
                    list.push(master_id);
                }
            }
            for game_type in &master.game_types {
                let list = self.masters_by_game_type.entry(game_type.clone()).or_default();
                if list.last() != Some(&master_id) {
                    list.push(master_id);
                }
            }
        }

        let linked = self
            .user_tags
            .values()
            .chain(self.master_tags.values())
            .flatten()
            .map(|link| link.tag_id)
            .chain(self.game_tags.values().flatten().copied());
        for tag_id in linked {
            *self.tag_usage.entry(tag_id).or_insert(0) += 1;
        }

        if self.as_of.is_none() {
            self.as_of = self.latest_timestamp();
        }
    }

    /// Latest timestamp anywhere in the dataset
    fn latest_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let behaviors = self.user_behaviors.values().flatten().map(|b| b.created_at);
        let orders = self.user_orders.values().flatten().map(|o| o.created_at);
        let masters = self
            .masters
            .values()
            .flat_map(|m| [m.created_at, m.updated_at])
            .flatten();
        let games = self
            .games
            .values()
            .flat_map(|g| [g.created_at, g.updated_at])
            .flatten();
        behaviors.chain(orders).chain(masters).chain(games).max()
    }

    /// Validate data integrity
    ///
    /// Check that:
    /// - Every behavior and order references an existing user
    /// - Every order references an existing master
    /// - Every tag link references an existing tag
    /// - Scores and ratings are in [0, 5]; prices and amounts are non-negative
    /// - Tag and tag-link weights are finite and non-negative
    pub fn validate(&self) -> Result<()> {
        for master in self.masters.values() {
            if let Some(score) = master.score {
                check_range("master.score", score, 0.0, 5.0)?;
            }
            if let Some(price) = master.price {
                check_range("master.price", price, 0.0, f64::MAX)?;
            }
        }

        for behavior in self.user_behaviors.values().flatten() {
            if !self.users.contains_key(&behavior.user_id) {
                return Err(missing("User", behavior.user_id));
            }
        }

        for order in self.user_orders.values().flatten() {
            if !self.users.contains_key(&order.user_id) {
                return Err(missing("User", order.user_id));
            }
            if !self.masters.contains_key(&order.master_id) {
                return Err(missing("GameMaster", order.master_id));
            }
            if let Some(rating) = order.rating {
                check_range("order.rating", rating, 0.0, 5.0)?;
            }
            check_range("order.amount", order.amount, 0.0, f64::MAX)?;
        }

        for tag in self.tags.values() {
            if let Some(weight) = tag.weight {
                check_range("tag.weight", weight, 0.0, f64::MAX)?;
            }
        }

        for link in self.user_tags.values().chain(self.master_tags.values()).flatten() {
            if let Some(weight) = link.weight {
                check_range("tag_link.weight", weight, 0.0, f64::MAX)?;
            }
        }

        let links = self
            .user_tags
            .values()
            .chain(self.master_tags.values())
            .flatten()
            .map(|l| l.tag_id)
            .chain(self.game_tags.values().flatten().copied());
        for tag_id in links {
            if !self.tags.contains_key(&tag_id) {
                return Err(missing("Tag", tag_id));
            }
        }

        Ok(())
    }
}

fn missing(entity: &str, id: u64) -> DataLoadError {
    DataLoadError::MissingReference {
        entity: entity.to_string(),
        id,
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(DataLoadError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}
