//! # Sources Crate
//!
//! Candidate generation (recall) for companion recommendations.
//!
//! ## Components
//!
//! ### PreferenceRecall
//! Masters whose game types match what the user declared.
//!
//! ### SimilarUserRecall
//! "Users who look like you booked these masters": profile similarity over
//! region, age, game types and tags, then the masters those users chose.
//!
//! ### PopularityRecall
//! Well-rated, busy masters who are online. Keeps cold-start users covered.
//!
//! ### RecallService
//! Runs every registered `RecallStrategy` in parallel and unions the output,
//! deduplicated by master ID in first-seen order. A failing strategy is
//! logged and skipped.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{PopularityRecall, PreferenceRecall, RecallService, SimilarUserRecall};
//! use sources::user_context::build_user_context;
//!
//! let recall = RecallService::new()
//!     .add_strategy(PreferenceRecall::new(index.clone(), 100))
//!     .add_strategy(SimilarUserRecall::new(index.clone()))
//!     .add_strategy(PopularityRecall::new(index.clone(), 50));
//!
//! let context = build_user_context(&index, user_id);
//! let candidates = recall.recall(&context);
//! ```

// Public modules
pub mod popularity;
pub mod preference;
pub mod recall;
pub mod similar_users;
pub mod types;
pub mod user_context;

// Re-export commonly used types
pub use popularity::PopularityRecall;
pub use preference::PreferenceRecall;
pub use recall::{RecallConfig, RecallService, RecallStrategy};
pub use similar_users::SimilarUserRecall;
pub use types::{Candidate, CandidateSource, UserContext};
