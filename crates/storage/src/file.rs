//! Filesystem-backed blob storage.
//!
//! Every blob path maps to a file directly under the configured root.
//! Paths must be relative and may not climb out of the root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{BlobStorage, StorageError};

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let well_formed = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }

    fn io_error(path: &str, source: std::io::Error) -> StorageError {
        if source.kind() == ErrorKind::NotFound {
            StorageError::NotFound(path.to_owned())
        } else {
            StorageError::Io {
                path: path.to_owned(),
                source,
            }
        }
    }
}

#[async_trait]
impl BlobStorage for FileStorage {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(path, e))?;
        }
        debug!(path, bytes = data.len(), "writing blob");
        tokio::fs::write(&full, data)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_blobs_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        storage.put("nested/blob", b"42.5".to_vec()).await.unwrap();
        assert_eq!(storage.get("nested/blob").await.unwrap(), b"42.5");
        assert!(dir.path().join("nested").join("blob").exists());

        storage.delete("nested/blob").await.unwrap();
        assert!(matches!(
            storage.get("nested/blob").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_paths_escaping_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        for bad in ["", "../etc/passwd", "/abs", "a/../../b"] {
            assert!(
                matches!(storage.get(bad).await, Err(StorageError::InvalidPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn deleting_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.delete("ghost").await.unwrap();
    }
}
