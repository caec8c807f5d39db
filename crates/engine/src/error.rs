//! Engine-level error types.
//!
//! [`ValidationError`] is the closed set of reasons a submitted DAG is
//! malformed; callers answer those with a client error. Everything in
//! [`EngineError`] outside its `Validation` variant is a system fault.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Why a DAG was rejected before any job was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ValidationError {
    #[error("the workflow has no operators")]
    NoOperator,

    /// An operator names an input or output missing from the artifact set.
    #[error("an operator references an undefined artifact")]
    UndefinedArtifact,

    /// An artifact is not the output of any operator.
    #[error("an artifact is never produced by any operator")]
    UnreachableArtifact,

    /// No execution order satisfies every operator's inputs; usually a cycle.
    #[error("an operator can never be executed because its inputs are never all available")]
    UnexecutableOperator,
}

impl ValidationError {
    pub const ALL: [ValidationError; 4] = [
        Self::NoOperator,
        Self::UndefinedArtifact,
        Self::UnreachableArtifact,
        Self::UnexecutableOperator,
    ];
}

/// Errors produced by the workflow engine (validation, execution and
/// result collection).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid workflow: {0}")]
    Validation(#[from] ValidationError),

    /// An edge names an operator the DAG doesn't contain.
    #[error("edge references unknown operator '{0}'")]
    UnknownOperator(Uuid),

    #[error("preview was canceled with {dispatched} operator(s) still running")]
    Canceled { dispatched: usize },

    #[error("preview exceeded its {timeout:?} deadline with {dispatched} operator(s) still running")]
    DeadlineExceeded { timeout: Duration, dispatched: usize },

    #[error("failed to build job spec for operator '{operator_id}': {source}")]
    JobSpec {
        operator_id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    /// The run's storage paths have no entry for this operator or artifact.
    #[error("no storage path assigned to '{0}'")]
    MissingStoragePath(Uuid),

    /// A job reported success but left output that doesn't match the
    /// artifact's declared type.
    #[error("artifact '{artifact_id}' content is not a valid {expected}: {content:?}")]
    MalformedArtifact {
        artifact_id: Uuid,
        expected: &'static str,
        content: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

impl EngineError {
    /// True when the caller sent a malformed DAG, as opposed to the engine
    /// failing while handling a well-formed one.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The validation sentinel, if this is one.
    pub fn validation(&self) -> Option<ValidationError> {
        match self {
            Self::Validation(e) => Some(*e),
            _ => None,
        }
    }
}
