//! Local durable key-value blob storage.
//!
//! The durable queue persists its state as one JSON blob under a single key.
//! The store is assumed to survive page reloads and process restarts, but
//! not profile wipes; if it is entirely unavailable the queue degrades to
//! fire-and-forget, which is a documented, accepted data-loss mode.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use studyflow_core::error::{Result, StudyError};
use tokio::fs;
use tokio::sync::RwLock;

/// A simple key -> string blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value` under `key`, replacing any previous blob.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the blob under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Filesystem-backed blob store, one file per key under a base directory.
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    /// Creates a new `FileBlobStore` rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| StudyError::storage(format!("failed to create blob dir: {e}")))?;
        Ok(Self { base_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are internal constants, not user input; a flat layout is fine.
        self.base_dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StudyError::storage(format!(
                "failed to read blob {path:?}: {e}"
            ))),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename keeps the blob intact if the process dies mid-write.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .await
            .map_err(|e| StudyError::storage(format!("failed to write blob {tmp:?}: {e}")))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StudyError::storage(format!("failed to commit blob {path:?}: {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StudyError::storage(format!(
                "failed to remove blob {path:?}: {e}"
            ))),
        }
    }
}

/// In-memory blob store for tests and for environments without durable
/// local storage.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, String>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

/// Blob store that fails every operation, modeling an environment where
/// local durable storage is unavailable. Consumers must degrade to
/// fire-and-forget rather than error out.
pub struct UnavailableBlobStore;

#[async_trait]
impl BlobStore for UnavailableBlobStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(StudyError::storage("local storage unavailable"))
    }

    async fn put(&self, _key: &str, _value: &str) -> Result<()> {
        Err(StudyError::storage("local storage unavailable"))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(StudyError::storage("local storage unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).await.unwrap();

        assert_eq!(store.get("queue").await.unwrap(), None);
        store.put("queue", "[1,2,3]").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap().as_deref(), Some("[1,2,3]"));

        store.put("queue", "[]").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap().as_deref(), Some("[]"));

        store.remove("queue").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap(), None);
        // Removing again is a no-op.
        store.remove("queue").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileBlobStore::new(dir.path()).await.unwrap();
            store.put("queue", "persisted").await.unwrap();
        }
        let reopened = FileBlobStore::new(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("queue").await.unwrap().as_deref(),
            Some("persisted")
        );
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryBlobStore::new();
        store.put("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
