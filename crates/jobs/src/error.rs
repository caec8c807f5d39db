//! Job-level error type.

use thiserror::Error;

/// Errors returned by a [`crate::JobManager`].
///
/// The engine treats any `launch` error as the operator failing, and any
/// `poll` error as transient.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job manager config is not valid: {0}")]
    InvalidConfig(String),

    #[error("job '{0}' does not exist")]
    JobNotExist(String),

    #[error("job '{0}' already exists")]
    JobAlreadyExists(String),

    /// The backend refused to start the job.
    #[error("job '{job_name}' was rejected: {message}")]
    LaunchRejected { job_name: String, message: String },

    /// The caller's cancellation token fired before the backend answered.
    #[error("job '{0}' call was canceled")]
    Canceled(String),

    /// Anything else the backend reports.
    #[error("job backend error: {0}")]
    Backend(String),
}
