//! Filter implementations for the candidate pipeline.
//!
//! Applied in this order by FilterService: validity, game match,
//! preference, business rules.

pub mod business_rules;
pub mod game_match;
pub mod preference;
pub mod validity;

// Re-export for convenience
pub use business_rules::{BusinessRuleFilter, BusinessRules};
pub use game_match::GameMatchFilter;
pub use preference::PreferenceFilter;
pub use validity::ValidityFilter;
