//! JSON persistence of the ledger
//!
//! The whole node state is one JSON document. Writes go to a sibling
//! temporary file, are synced, and then renamed into place.

use crate::block::{Block, LandRecord};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default file name of the snapshot inside the data directory
pub const DEFAULT_FILE_NAME: &str = "chain_data.json";

/// Persisted node state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Blocks, genesis first
    pub chain: Vec<Block>,
    /// Records waiting for the next block
    #[serde(default)]
    pub pending: Vec<LandRecord>,
    /// Registered peers
    #[serde(default)]
    pub nodes: BTreeSet<String>,
}

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    /// Store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot
    ///
    /// A missing or empty file yields `None`.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not a valid snapshot
    pub fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write the snapshot, replacing the previous one
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            // contents must be on disk before the rename makes them current
            file.sync_all()?;
            std::fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| self.io_error(e))?;
        tracing::trace!(path = %self.path.display(), blocks = snapshot.chain.len(), "chain saved");
        Ok(())
    }

    /// Move an unusable snapshot aside as `<name>.corrupt`
    ///
    /// Returns the new location, or `None` if there was no file.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be renamed
    pub fn quarantine(&self) -> Result<Option<PathBuf>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let target = self.path.with_extension("json.corrupt");
        std::fs::rename(&self.path, &target).map_err(|e| self.io_error(e))?;
        Ok(Some(target))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
