//! In-memory blob store for tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::BlobStore;
use crate::error::{StorageError, StorageResult};

/// A `BlobStore` backed by a map. Clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object with raw bytes.
    pub async fn put(&self, key: impl Into<String>, data: Vec<u8>) {
        self.objects.write().await.insert(key.into(), data);
    }

    /// Seed an object with a JSON value.
    pub async fn put_json(&self, key: impl Into<String>, value: &serde_json::Value) {
        self.put(key, serde_json::to_vec(value).expect("serializable value"))
            .await;
    }

    /// Raw bytes of an object, if present.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<()> {
        let bytes = self
            .get(key)
            .await
            .ok_or_else(|| StorageError::not_found(key))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }

    async fn upload_from_file(
        &self,
        src: &Path,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<()> {
        let bytes = tokio::fs::read(src).await?;
        self.put(key, bytes).await;
        Ok(())
    }

    async fn read_json(&self, key: &str) -> StorageResult<serde_json::Value> {
        let bytes = self
            .get(key)
            .await
            .ok_or_else(|| StorageError::not_found(key))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_json(&self, key: &str, value: &serde_json::Value) -> StorageResult<()> {
        self.put_json(key, value).await;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
