//! Per-run storage locations for operator metadata and artifact contents.
//!
//! Every run gets fresh, never-reused paths so concurrent runs of the same
//! workflow cannot read each other's outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use storage::BlobStorage;
use tracing::warn;
use uuid::Uuid;

use crate::models::{ArtifactId, OperatorId, WorkflowDag};
use crate::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStoragePaths {
    pub operator_metadata_paths: BTreeMap<OperatorId, String>,
    pub artifact_paths: BTreeMap<ArtifactId, String>,
    pub artifact_metadata_paths: BTreeMap<ArtifactId, String>,
}

impl WorkflowStoragePaths {
    /// Assign a fresh path to every operator and artifact in `dag`.
    pub fn generate(dag: &WorkflowDag) -> Self {
        let fresh = || Uuid::new_v4().to_string();
        Self {
            operator_metadata_paths: dag.operators.keys().map(|id| (*id, fresh())).collect(),
            artifact_paths: dag.artifacts.keys().map(|id| (*id, fresh())).collect(),
            artifact_metadata_paths: dag.artifacts.keys().map(|id| (*id, fresh())).collect(),
        }
    }

    pub fn operator_metadata(&self, id: OperatorId) -> Result<&str, EngineError> {
        lookup(&self.operator_metadata_paths, id)
    }

    pub fn artifact_content(&self, id: ArtifactId) -> Result<&str, EngineError> {
        lookup(&self.artifact_paths, id)
    }

    pub fn artifact_metadata(&self, id: ArtifactId) -> Result<&str, EngineError> {
        lookup(&self.artifact_metadata_paths, id)
    }

    /// Delete every blob this run wrote. Artifact contents are only removed
    /// when `include_contents` is set; persisted runs keep them.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn cleanup(&self, storage: &dyn BlobStorage, include_contents: bool) {
        let mut paths: Vec<&String> = self
            .operator_metadata_paths
            .values()
            .chain(self.artifact_metadata_paths.values())
            .collect();
        if include_contents {
            paths.extend(self.artifact_paths.values());
        }

        for path in paths {
            if let Err(e) = storage.delete(path).await {
                warn!(path = %path, error = %e, "failed to clean up run storage");
            }
        }
    }
}

fn lookup(paths: &BTreeMap<Uuid, String>, id: Uuid) -> Result<&str, EngineError> {
    paths
        .get(&id)
        .map(String::as_str)
        .ok_or(EngineError::MissingStoragePath(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::basic_dag;
    use storage::MemoryStorage;

    #[test]
    fn every_node_gets_a_distinct_path() {
        let f = basic_dag();
        let paths = WorkflowStoragePaths::generate(&f.dag);

        assert_eq!(paths.operator_metadata_paths.len(), 4);
        assert_eq!(paths.artifact_paths.len(), 3);
        assert_eq!(paths.artifact_metadata_paths.len(), 3);

        let mut all: Vec<&String> = paths
            .operator_metadata_paths
            .values()
            .chain(paths.artifact_paths.values())
            .chain(paths.artifact_metadata_paths.values())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn regenerating_never_reuses_paths() {
        let f = basic_dag();
        let first = WorkflowStoragePaths::generate(&f.dag);
        let second = WorkflowStoragePaths::generate(&f.dag);
        assert_ne!(first.artifact_content(f.art2).unwrap(), second.artifact_content(f.art2).unwrap());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let f = basic_dag();
        let paths = WorkflowStoragePaths::generate(&f.dag);
        let ghost = Uuid::new_v4();
        assert!(matches!(
            paths.operator_metadata(ghost),
            Err(EngineError::MissingStoragePath(id)) if id == ghost
        ));
    }

    #[tokio::test]
    async fn cleanup_keeps_contents_unless_asked() {
        let f = basic_dag();
        let paths = WorkflowStoragePaths::generate(&f.dag);
        let storage = MemoryStorage::new();

        let content = paths.artifact_content(f.art0).unwrap().to_owned();
        let metadata = paths.operator_metadata(f.func0).unwrap().to_owned();
        storage.put(&content, b"data".to_vec()).await.unwrap();
        storage.put(&metadata, b"{}".to_vec()).await.unwrap();

        paths.cleanup(&storage, false).await;
        assert!(storage.contains(&content).await);
        assert!(!storage.contains(&metadata).await);

        paths.cleanup(&storage, true).await;
        assert!(storage.is_empty().await);
    }
}
