//! Core trait for the filtering pipeline.

use anyhow::Result;
use sources::{Candidate, UserContext};

/// What the pipeline does with a batch when a filter cannot run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Pass the batch on unfiltered
    Skip,
    /// Drop the whole batch; for filters that guard exclusions
    DropAll,
}

/// A single filtering stage.
///
/// ## Design Note
/// - `Send + Sync` lets the orchestrator share filters across blocking tasks
/// - Filters take ownership of the Vec<Candidate> and return what survives,
///   in the same relative order
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a set of candidates.
    ///
    /// # Returns
    /// * `Ok(Vec<Candidate>)` - The surviving candidates
    /// * `Err` - The stage could not run; the pipeline follows [`Filter::on_failure`]
    fn apply(&self, candidates: Vec<Candidate>, context: &UserContext) -> Result<Vec<Candidate>>;

    fn on_failure(&self) -> OnFailure {
        OnFailure::Skip
    }
}
