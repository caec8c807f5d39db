//! `jobs` crate: the job execution backend seam.
//!
//! The engine never runs operator code itself. It hands a [`JobSpec`] to a
//! [`JobManager`] and polls the job until it reaches a terminal
//! [`ExecutionStatus`]. Secrets stay behind [`SecretStore`]; only its
//! configuration travels inside the spec.

pub mod config;
pub mod error;
pub mod mock;
pub mod secrets;
pub mod spec;
pub mod status;
pub mod traits;

pub use config::JobManagerConfig;
pub use error::JobError;
pub use secrets::{SecretStore, SecretStoreConfig, StaticSecretStore};
pub use spec::JobSpec;
pub use status::ExecutionStatus;
pub use traits::JobManager;
