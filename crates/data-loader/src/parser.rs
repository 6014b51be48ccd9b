//! Parsers for the JSON dataset files.
//!
//! Every entity file is a single JSON array of records. Required files must
//! exist; optional files (tags, behaviors, orders, ...) are treated as empty
//! when absent so a minimal dataset is just users, masters and games.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Parse a required JSON array file into a Vec of records
pub fn parse_json_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;

    let records: Vec<T> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| DataLoadError::ParseError {
            file: path.display().to_string(),
            line: e.line(),
            reason: e.to_string(),
        })?;

    debug!("Parsed {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse an optional JSON array file; a missing file yields an empty Vec
pub fn parse_optional_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        debug!("Optional file {} not present", path.display());
        return Ok(Vec::new());
    }
    parse_json_file(path)
}

pub fn parse_users(path: &Path) -> Result<Vec<User>> {
    parse_json_file(path)
}

pub fn parse_masters(path: &Path) -> Result<Vec<GameMaster>> {
    parse_json_file(path)
}

pub fn parse_games(path: &Path) -> Result<Vec<Game>> {
    parse_json_file(path)
}

/// Parse the optional `meta.json` object
pub fn parse_meta(path: &Path) -> Result<DatasetMeta> {
    if !path.exists() {
        return Ok(DatasetMeta::default());
    }
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| DataLoadError::ParseError {
        file: path.display().to_string(),
        line: e.line(),
        reason: e.to_string(),
    })
}
