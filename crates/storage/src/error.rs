//! Typed error type for the storage crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: '{0}'")]
    NotFound(String),

    #[error("invalid blob path '{0}'")]
    InvalidPath(String),

    #[error("io error on blob '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("blob '{path}' is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
