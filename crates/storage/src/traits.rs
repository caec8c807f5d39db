//! The `BlobStorage` trait: the contract every storage backend fulfils.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::StorageError;

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Fetch the full contents stored at `path`.
    ///
    /// Returns [`StorageError::NotFound`] when nothing was ever written there.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Store `data` at `path`, replacing any previous contents.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Remove the blob at `path`. Deleting a missing blob is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Read the blob at `path` and deserialize it as JSON.
pub async fn read_json<T: DeserializeOwned>(
    storage: &dyn BlobStorage,
    path: &str,
) -> Result<T, StorageError> {
    let bytes = storage.get(path).await?;
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Json {
        path: path.to_owned(),
        source,
    })
}
