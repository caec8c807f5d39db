//! Backend configuration, embedded into every job spec.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobManagerConfig {
    /// Operators run as local child processes.
    Process {
        /// Where the executor binaries live.
        binary_dir: PathBuf,
        /// Scratch space for unpacked operator code.
        operator_storage_dir: PathBuf,
    },
}
