//! In-process blob storage. Used by tests and by single-node setups that do
//! not need blobs to outlive the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{BlobStorage, StorageError};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.blobs.read().await.contains_key(path)
    }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_owned()))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.blobs.write().await.insert(path.to_owned(), data);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.blobs.write().await.remove(path);
        Ok(())
    }
}
