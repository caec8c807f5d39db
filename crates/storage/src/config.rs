//! Storage configuration, embedded verbatim into every job spec so the job
//! execution backend writes to the same place the engine reads from.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Blobs live as files under `directory`.
    File { directory: PathBuf },
}
