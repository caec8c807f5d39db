//! The job specification handed to the backend on launch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use storage::StorageConfig;
use uuid::Uuid;

use crate::{JobManagerConfig, SecretStoreConfig};

/// Everything a backend needs to run one operator.
///
/// `task` is the serialized operator spec; the engine builds it but the
/// backend is the only party that interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_name: String,
    pub operator_id: Uuid,
    pub operator_name: String,
    pub task: Value,

    pub storage_config: StorageConfig,
    pub secret_store_config: SecretStoreConfig,
    pub job_manager_config: JobManagerConfig,

    /// Where the job writes its `{ "error", "logs" }` metadata.
    pub metadata_path: String,
    pub input_content_paths: Vec<String>,
    pub input_metadata_paths: Vec<String>,
    pub output_content_paths: Vec<String>,
    pub output_metadata_paths: Vec<String>,
}
