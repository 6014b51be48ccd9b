//! Error types for the algorithms crate.

use data_loader::UserId;
use thiserror::Error;

/// Failures that abort a training or evaluation run.
///
/// Request-time problems never surface here: they degrade to zero scores.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgorithmError {
    #[error("Non-finite {entity} feature for id {id}")]
    NonFiniteFeature { entity: &'static str, id: u64 },

    #[error("Non-finite rating estimate for user {user_id} and {entity} {id}")]
    NonFiniteRating {
        user_id: UserId,
        entity: &'static str,
        id: u64,
    },

    #[error("Evaluation of {strategy} failed: {reason}")]
    Evaluation { strategy: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AlgorithmError>;
