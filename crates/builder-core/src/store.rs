//! Artifact persistence
//!
//! The engine only needs key/value access to raw artifact properties; the
//! stores here keep them in memory or as one JSON file per artifact.

use crate::artifact::{is_valid_id, ArtifactKind};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tempfile::NamedTempFile;
use tracing::debug;

/// A stored artifact's raw, unresolved properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub kind: ArtifactKind,
    pub id: String,
    pub properties: serde_json::Value,
}

/// Narrows [`ArtifactStore::list`] results
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Keep ids starting with this prefix
    pub id_prefix: Option<String>,
    /// Keep artifacts whose top-level properties equal these values
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl ListFilter {
    pub fn id_prefix(prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn matches(&self, id: &str, properties: &serde_json::Value) -> bool {
        if let Some(prefix) = &self.id_prefix {
            if !id.starts_with(prefix.as_str()) {
                return false;
            }
        }
        self.properties
            .iter()
            .all(|(key, expected)| properties.get(key) == Some(expected))
    }
}

pub trait ArtifactStore: Send + Sync {
    fn get(&self, kind: ArtifactKind, id: &str) -> Result<serde_json::Value, StoreError>;

    /// Artifacts of one kind, ordered by id
    fn list(&self, kind: ArtifactKind, filter: Option<&ListFilter>) -> Result<Vec<StoredArtifact>, StoreError>;

    fn put(&self, kind: ArtifactKind, id: &str, properties: &serde_json::Value) -> Result<(), StoreError>;

    fn delete(&self, kind: ArtifactKind, id: &str) -> Result<(), StoreError>;
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

fn not_found(kind: ArtifactKind, id: &str) -> StoreError {
    StoreError::NotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    }
}

/// Store backed by a map; for tests and one-shot CLI runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RwLock<BTreeMap<(ArtifactKind, String), serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryStore {
    fn get(&self, kind: ArtifactKind, id: &str) -> Result<serde_json::Value, StoreError> {
        let artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
        artifacts
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(kind, id))
    }

    fn list(&self, kind: ArtifactKind, filter: Option<&ListFilter>) -> Result<Vec<StoredArtifact>, StoreError> {
        let artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(artifacts
            .iter()
            .filter(|((k, id), props)| *k == kind && filter.map_or(true, |f| f.matches(id, props)))
            .map(|((kind, id), props)| StoredArtifact {
                kind: *kind,
                id: id.clone(),
                properties: props.clone(),
            })
            .collect())
    }

    fn put(&self, kind: ArtifactKind, id: &str, properties: &serde_json::Value) -> Result<(), StoreError> {
        validate_id(id)?;
        let mut artifacts = self.artifacts.write().unwrap_or_else(PoisonError::into_inner);
        artifacts.insert((kind, id.to_string()), properties.clone());
        Ok(())
    }

    fn delete(&self, kind: ArtifactKind, id: &str) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().unwrap_or_else(PoisonError::into_inner);
        artifacts
            .remove(&(kind, id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(kind, id))
    }
}

/// Store keeping `<root>/<kind>/<id>.json` files
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, kind: ArtifactKind, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.root.join(kind.as_str()).join(format!("{}.json", id)))
    }
}

impl ArtifactStore for DirectoryStore {
    fn get(&self, kind: ArtifactKind, id: &str) -> Result<serde_json::Value, StoreError> {
        let path = self.path_for(kind, id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(kind, id)),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, kind: ArtifactKind, filter: Option<&ListFilter>) -> Result<Vec<StoredArtifact>, StoreError> {
        let dir = self.root.join(kind.as_str());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_id(id).is_ok() {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();

        let mut artifacts = Vec::with_capacity(ids.len());
        for id in ids {
            let properties = self.get(kind, &id)?;
            if filter.map_or(true, |f| f.matches(&id, &properties)) {
                artifacts.push(StoredArtifact { kind, id, properties });
            }
        }
        Ok(artifacts)
    }

    fn put(&self, kind: ArtifactKind, id: &str, properties: &serde_json::Value) -> Result<(), StoreError> {
        let path = self.path_for(kind, id)?;
        let dir = self.root.join(kind.as_str());
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, properties)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(%kind, id, path = %path.display(), "stored artifact");
        Ok(())
    }

    fn delete(&self, kind: ArtifactKind, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(kind, id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(kind, id)),
            Err(e) => Err(e.into()),
        }
    }
}
