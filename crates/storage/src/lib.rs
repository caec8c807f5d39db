//! `storage` crate: blob storage used for operator code, artifact contents
//! and per-run metadata.
//!
//! Blobs are addressed by opaque path strings handed out by the engine.
//! Nothing in here knows what a workflow is.

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

use std::sync::Arc;

pub use config::StorageConfig;
pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{read_json, BlobStorage};

/// Build the storage backend described by `config`.
pub fn open(config: &StorageConfig) -> Arc<dyn BlobStorage> {
    match config {
        StorageConfig::File { directory } => Arc::new(FileStorage::new(directory.clone())),
    }
}
