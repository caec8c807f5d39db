//! The secret-store seam.
//!
//! The engine only ever forwards the store's configuration to jobs; it never
//! reads a secret value itself.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretStoreConfig {
    /// Encrypted credentials stored as files under `directory`.
    File { directory: PathBuf },
}

pub trait SecretStore: Send + Sync {
    fn config(&self) -> SecretStoreConfig;
}

/// A store that is nothing more than its configuration.
#[derive(Debug, Clone)]
pub struct StaticSecretStore {
    config: SecretStoreConfig,
}

impl StaticSecretStore {
    pub fn new(config: SecretStoreConfig) -> Self {
        Self { config }
    }
}

impl SecretStore for StaticSecretStore {
    fn config(&self) -> SecretStoreConfig {
        self.config.clone()
    }
}
