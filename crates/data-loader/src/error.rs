//! Error types for the data-loader crate.
//!
//! These are the "systemic" failures of the engine: the entity store could
//! not be read at all, so no recommendation can be produced. Missing entities
//! inside a loaded store are not errors; lookups return `None` instead.

use thiserror::Error;

/// Errors that can occur while loading and validating a dataset
///
/// Rust concept: The `#[derive(Error)]` macro from thiserror implements
/// `std::error::Error` and `Display` from the `#[error(...)]` attributes
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// A required dataset file does not exist
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A JSON document could not be decoded
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an out-of-range value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g., an order for an unknown master)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u64 },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
