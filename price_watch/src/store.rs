//! Last-known-state persistence
//!
//! A single JSON file holding the snapshot as an ordered array of records.
//! A missing or unreadable file means "no previous snapshot".

use crate::error::{Result, WatchError};
use crate::model::CatalogSnapshot;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON file holding the previous run's snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CatalogSnapshot> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| WatchError::PersistenceRead(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| WatchError::PersistenceRead(e.to_string()))
    }

    /// Load the previous snapshot, falling back to an empty one
    pub fn load(&self) -> CatalogSnapshot {
        if !self.path.exists() {
            log::info!("No previous snapshot at {}", self.path.display());
            return CatalogSnapshot::new();
        }

        match self.read() {
            Ok(snapshot) => {
                log::info!(
                    "Loaded previous snapshot: {} products from {}",
                    snapshot.len(),
                    self.path.display()
                );
                snapshot
            }
            Err(e) => {
                log::warn!("{} ({}), starting from empty", e, self.path.display());
                CatalogSnapshot::new()
            }
        }
    }

    /// Replace the stored snapshot with `snapshot`.
    ///
    /// Writes a sibling temp file and renames it over the old one.
    pub fn save(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                log::info!("Created directory: {}", parent.display());
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        log::info!(
            "Saved snapshot: {} products to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}
