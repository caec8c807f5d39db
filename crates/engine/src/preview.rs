//! End-to-end preview of a workflow: the dry run behind interactive testing.
//!
//! `PreviewService::preview`:
//! 1. Drops `Load` operators (unless configured not to).
//! 2. Validates the DAG.
//! 3. Assigns fresh storage paths for the run.
//! 4. Runs it with the [`Orchestrator`].
//! 5. Reads back operator and artifact results.
//! 6. Deletes the run's blobs.

use std::collections::BTreeMap;
use std::sync::Arc;

use jobs::{ExecutionStatus, JobManager, SecretStore};
use serde::Serialize;
use storage::{BlobStorage, StorageConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::collector::{skip_set, ArtifactResult, OperatorResult, ResultCollector};
use crate::dag::execution_order;
use crate::models::{ArtifactId, OperatorId, WorkflowDag};
use crate::orchestrator::Orchestrator;
use crate::paths::WorkflowStoragePaths;
use crate::{EngineError, PreviewConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResponse {
    pub status: ExecutionStatus,
    pub operator_results: BTreeMap<OperatorId, OperatorResult>,
    /// Only artifacts whose producer succeeded.
    pub artifact_results: BTreeMap<ArtifactId, ArtifactResult>,
}

pub struct PreviewService {
    orchestrator: Orchestrator,
    collector: ResultCollector,
    storage: Arc<dyn BlobStorage>,
}

impl PreviewService {
    /// `storage` must be the backend `storage_config` describes: jobs write
    /// through the config, the service reads and cleans up through `storage`.
    pub fn new(
        job_manager: Arc<dyn JobManager>,
        secret_store: Arc<dyn SecretStore>,
        storage: Arc<dyn BlobStorage>,
        storage_config: StorageConfig,
        config: PreviewConfig,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(job_manager, secret_store, storage_config, config),
            collector: ResultCollector::new(storage.clone()),
            storage,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        self.orchestrator.config()
    }

    /// # Errors
    /// [`EngineError::Validation`] for a malformed DAG (check
    /// [`EngineError::is_user_error`]); any other variant is an internal
    /// failure. Storage written before the failure is still cleaned up.
    #[instrument(skip_all, fields(workflow = %dag.metadata.name))]
    pub async fn preview(
        &self,
        dag: &WorkflowDag,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, EngineError> {
        let dag = if self.config().skip_load_operators {
            dag.without_load_operators()
        } else {
            dag.clone()
        };
        let order = execution_order(&dag)?;

        let paths = WorkflowStoragePaths::generate(&dag);
        let result = self.run(&dag, order, &paths, cancel).await;

        if self.config().cleanup_storage {
            paths.cleanup(self.storage.as_ref(), true).await;
        }

        if let Ok(response) = &result {
            info!(
                status = %response.status,
                artifacts = response.artifact_results.len(),
                "preview complete"
            );
        }
        result
    }

    async fn run(
        &self,
        dag: &WorkflowDag,
        order: Vec<OperatorId>,
        paths: &WorkflowStoragePaths,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, EngineError> {
        let report = self.orchestrator.execute(dag, order, paths, cancel).await?;

        let operator_results = self.collector.collect_operator_results(paths, &report).await;
        let skip = skip_set(dag, &operator_results);
        let artifact_results = self
            .collector
            .collect_results(paths, &dag.artifacts, &skip)
            .await?;

        Ok(PreviewResponse {
            status: report.status,
            operator_results,
            artifact_results,
        })
    }
}
