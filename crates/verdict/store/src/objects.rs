//! Object stores: byte documents addressed by (store, key).
//!
//! Used to stage artifacts and rule bundles and to persist run reports. The
//! broker only needs `get` and `put`.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use verdict_types::ArtifactRef;

/// Byte-document store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a document. Missing documents are an error, not an empty read.
    async fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>>;

    /// Store a document, overwriting any previous version.
    async fn put(&self, artifact: &ArtifactRef, bytes: Vec<u8>) -> StoreResult<()>;
}

/// In-memory object store for tests and single-process runs.
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), Vec<u8>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>> {
        self.objects
            .get(&(artifact.store.clone(), artifact.key.clone()))
            .map(|bytes| bytes.clone())
            .ok_or_else(|| StoreError::NotFound(artifact.to_string()))
    }

    async fn put(&self, artifact: &ArtifactRef, bytes: Vec<u8>) -> StoreResult<()> {
        self.objects
            .insert((artifact.store.clone(), artifact.key.clone()), bytes);
        Ok(())
    }
}

/// Filesystem-backed object store rooted at a directory.
///
/// Documents live at `<root>/<store>/<key>`. Keys may contain `/` separators
/// but must stay inside the root.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, artifact: &ArtifactRef) -> StoreResult<PathBuf> {
        for part in [&artifact.store, &artifact.key] {
            if Path::new(part)
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(StoreError::InvalidData(format!(
                    "key escapes store root: {}",
                    artifact
                )));
            }
        }
        Ok(self.root.join(&artifact.store).join(&artifact.key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>> {
        let path = self.path_for(artifact)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(artifact.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, artifact: &ArtifactRef, bytes: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(artifact)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}
