//! The `JobManager` trait: the contract every execution backend fulfils.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{ExecutionStatus, JobError, JobManagerConfig, JobSpec};

#[async_trait]
pub trait JobManager: Send + Sync {
    /// Configuration forwarded to jobs so they can reach the backend's
    /// own resources.
    fn config(&self) -> JobManagerConfig;

    /// Start a job named `name`. Returns once the backend has accepted it,
    /// not when it finishes.
    ///
    /// Implementations should give up with [`JobError::Canceled`] once
    /// `cancel` fires. Callers still race the call against the token.
    async fn launch(&self, name: &str, spec: &JobSpec, cancel: &CancellationToken) -> Result<(), JobError>;

    /// Current status of a previously launched job.
    async fn poll(&self, name: &str, cancel: &CancellationToken) -> Result<ExecutionStatus, JobError>;
}
