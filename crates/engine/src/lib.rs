//! `engine` crate. The workflow control-plane core: DAG model, validation,
//! the preview scheduler and result collection.

pub mod collector;
pub mod config;
pub mod dag;
pub mod error;
pub mod graph;
pub mod models;
pub mod orchestrator;
pub mod paths;
pub mod preview;
pub mod state;

pub use collector::{skip_set, ArtifactResult, OperatorResult, ResultCollector};
pub use config::PreviewConfig;
pub use dag::{execution_order, validate};
pub use error::{EngineError, ValidationError};
pub use graph::DagGraph;
pub use jobs::ExecutionStatus;
pub use models::{Artifact, ArtifactSpec, Operator, OperatorSpec, WorkflowDag};
pub use orchestrator::{Orchestrator, RunReport};
pub use paths::WorkflowStoragePaths;
pub use preview::{PreviewResponse, PreviewService};
pub use state::OperatorState;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod orchestrator_tests;
