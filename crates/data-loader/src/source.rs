//! Pluggable access to the entity store.
//!
//! The engine never reads files directly; it asks a `DataSource` for a fully
//! built `DataIndex`. Reloading is just calling `load` again and swapping the
//! result in.

use crate::error::Result;
use crate::types::DataIndex;
use std::path::{Path, PathBuf};

/// Anything that can produce a complete, validated `DataIndex`
pub trait DataSource: Send + Sync {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    fn load(&self) -> Result<DataIndex>;
}

/// Reads a dataset directory of JSON files
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    data_dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl DataSource for JsonDirSource {
    fn describe(&self) -> String {
        format!("json:{}", self.data_dir.display())
    }

    fn load(&self) -> Result<DataIndex> {
        DataIndex::load_from_dir(&self.data_dir)
    }
}
