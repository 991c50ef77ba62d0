//! The `persistence` module saves and restores the topic registry.
//!
//! Only topic existence survives a round trip. The on-disk form maps each
//! topic name to a subscriber list, but connections cannot be serialized, so
//! saved lists are always empty and loaded lists are ignored.

pub mod json_store;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::PersistenceError;

pub use json_store::JsonFileStore;

/// Persisted form of the registry: `{"topic": [], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub topics: BTreeMap<String, Vec<serde_json::Value>>,
}

impl Snapshot {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            topics: names
                .into_iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.topics.keys().map(String::as_str)
    }

    pub fn into_names(self) -> impl Iterator<Item = String> {
        self.topics.into_keys()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Save/load contract for registry snapshots.
pub trait SnapshotStore: Send + Sync + 'static {
    fn save(
        &self,
        path: &Path,
        snapshot: &Snapshot,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn load(&self, path: &Path) -> impl Future<Output = Result<Snapshot, PersistenceError>> + Send;
}
