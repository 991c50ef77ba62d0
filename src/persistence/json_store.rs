//! Snapshot store backed by JSON files.
//!
//! Relative paths are resolved against a base directory (the configured
//! `persistence.snapshot_dir`); absolute paths are used as given.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::persistence::{Snapshot, SnapshotStore};
use crate::utils::error::PersistenceError;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(".")
    }
}

impl SnapshotStore for JsonFileStore {
    async fn save(&self, path: &Path, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let path = self.resolve(path);
        let data = serde_json::to_vec(snapshot).map_err(|source| PersistenceError::Parse {
            path: path.clone(),
            source,
        })?;

        if let Err(source) = tokio::fs::write(&path, data).await {
            error!("Failed to save topics to {}: {source}", path.display());
            return Err(PersistenceError::Io { path, source });
        }

        info!("Saved {} topic(s) to {}", snapshot.len(), path.display());
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<Snapshot, PersistenceError> {
        let path = self.resolve(path);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(source) => {
                error!("Failed to load topics from {}: {source}", path.display());
                return Err(PersistenceError::Io { path, source });
            }
        };

        let snapshot: Snapshot = match serde_json::from_slice(&data) {
            Ok(snapshot) => snapshot,
            Err(source) => {
                error!("Failed to parse topics in {}: {source}", path.display());
                return Err(PersistenceError::Parse { path, source });
            }
        };

        info!("Loaded {} topic(s) from {}", snapshot.len(), path.display());
        Ok(snapshot)
    }
}
