//! Reading a finished run's outputs back out of storage.
//!
//! Jobs write a metadata blob per operator and a content blob (plus, for
//! tables, a metadata blob) per artifact. The collector turns those into
//! typed results. Outputs of operators that didn't succeed are never read.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use jobs::ExecutionStatus;
use serde::{Deserialize, Serialize};
use storage::{BlobStorage, StorageConfig};
use tracing::{debug, warn};

use crate::models::{Artifact, ArtifactId, ArtifactSpec, OperatorId, WorkflowDag};
use crate::orchestrator::RunReport;
use crate::paths::WorkflowStoragePaths;
use crate::state::OperatorState;
use crate::EngineError;

const MISSING_METADATA_MSG: &str = "Unable to retrieve metadata for this operator. \
     The workflow might have failed before executing this operator.";
const SKIPPED_MSG: &str = "This operator was not executed because an upstream operator failed.";
const FAILED_WITHOUT_ERROR_MSG: &str = "The operator's job failed without reporting an error.";

// ---------------------------------------------------------------------------
// Blob shapes written by jobs
// ---------------------------------------------------------------------------

/// Per-operator metadata blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorMetadata {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub logs: BTreeMap<String, String>,
}

/// Per-table metadata blob: one `{ column: type }` entry per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(default)]
    pub schema: Vec<BTreeMap<String, String>>,
}

// ---------------------------------------------------------------------------
// Typed results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorResult {
    pub status: ExecutionStatus,
    pub logs: BTreeMap<String, String>,
    pub err_msg: String,
}

impl OperatorResult {
    fn failed(err_msg: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            logs: BTreeMap::new(),
            err_msg: err_msg.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactResult {
    Table { table_schema: TableMetadata, data: String },
    Metric { val: f64 },
    Check { passed: bool },
    Param { val: String },
}

// ---------------------------------------------------------------------------
// ResultCollector
// ---------------------------------------------------------------------------

pub struct ResultCollector {
    storage: Arc<dyn BlobStorage>,
}

impl ResultCollector {
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(storage::open(config))
    }

    /// One result per operator in `report`. Never fails: an operator whose
    /// metadata can't be read is reported as failed with an explanation.
    pub async fn collect_operator_results(
        &self,
        paths: &WorkflowStoragePaths,
        report: &RunReport,
    ) -> BTreeMap<OperatorId, OperatorResult> {
        let mut results = BTreeMap::new();

        for (&op_id, &state) in &report.operators {
            let result = if state == OperatorState::Skipped {
                OperatorResult::failed(SKIPPED_MSG)
            } else {
                self.operator_result(paths, report, op_id, state).await
            };
            results.insert(op_id, result);
        }

        results
    }

    async fn operator_result(
        &self,
        paths: &WorkflowStoragePaths,
        report: &RunReport,
        op_id: OperatorId,
        state: OperatorState,
    ) -> OperatorResult {
        let metadata = match paths.operator_metadata(op_id) {
            Ok(path) => storage::read_json::<OperatorMetadata>(self.storage.as_ref(), path)
                .await
                .map_err(EngineError::from),
            Err(e) => {
                warn!(operator_id = %op_id, error = %e, "operator has no metadata path");
                Err(e)
            }
        };

        match metadata {
            Ok(meta) => {
                let succeeded = state == OperatorState::Succeeded && meta.error.is_empty();
                let err_msg = if succeeded || !meta.error.is_empty() {
                    meta.error
                } else {
                    FAILED_WITHOUT_ERROR_MSG.to_owned()
                };
                OperatorResult {
                    status: if succeeded {
                        ExecutionStatus::Succeeded
                    } else {
                        ExecutionStatus::Failed
                    },
                    logs: meta.logs,
                    err_msg,
                }
            }
            Err(e) => {
                debug!(operator_id = %op_id, error = %e, "operator metadata unavailable");
                match report.launch_errors.get(&op_id) {
                    Some(reason) => OperatorResult::failed(reason.clone()),
                    None => OperatorResult::failed(MISSING_METADATA_MSG),
                }
            }
        }
    }

    /// Typed results for every artifact in `artifacts` not listed in `skip`.
    ///
    /// # Errors
    /// Any storage failure, or content that doesn't parse as the artifact's
    /// declared type. Both mean a job claimed success without producing
    /// valid output.
    pub async fn collect_results(
        &self,
        paths: &WorkflowStoragePaths,
        artifacts: &BTreeMap<ArtifactId, Artifact>,
        skip: &BTreeSet<ArtifactId>,
    ) -> Result<BTreeMap<ArtifactId, ArtifactResult>, EngineError> {
        let mut results = BTreeMap::new();

        for (id, artifact) in artifacts {
            if skip.contains(id) {
                continue;
            }

            let content = self.storage.get(paths.artifact_content(*id)?).await?;
            let result = match artifact.spec {
                ArtifactSpec::Float => ArtifactResult::Metric {
                    val: parse_float(*id, &content)?,
                },
                ArtifactSpec::Bool => ArtifactResult::Check {
                    passed: parse_bool(*id, &content)?,
                },
                ArtifactSpec::Json => ArtifactResult::Param {
                    val: utf8(*id, content)?,
                },
                ArtifactSpec::Table => {
                    let table_schema = self.table_metadata(paths, *id).await;
                    ArtifactResult::Table {
                        table_schema,
                        data: utf8(*id, content)?,
                    }
                }
            };
            results.insert(*id, result);
        }

        Ok(results)
    }

    /// Missing or unreadable table metadata yields an empty schema.
    async fn table_metadata(&self, paths: &WorkflowStoragePaths, id: ArtifactId) -> TableMetadata {
        let Ok(path) = paths.artifact_metadata(id) else {
            return TableMetadata::default();
        };
        storage::read_json(self.storage.as_ref(), path)
            .await
            .unwrap_or_else(|e| {
                debug!(artifact_id = %id, error = %e, "no table metadata");
                TableMetadata::default()
            })
    }
}

/// Outputs of every operator in `dag` that did not succeed.
pub fn skip_set(
    dag: &WorkflowDag,
    operator_results: &BTreeMap<OperatorId, OperatorResult>,
) -> BTreeSet<ArtifactId> {
    operator_results
        .iter()
        .filter(|(_, r)| r.status != ExecutionStatus::Succeeded)
        .filter_map(|(id, _)| dag.operators.get(id))
        .flat_map(|op| op.outputs.iter().copied())
        .collect()
}

// ---------------------------------------------------------------------------
// Content parsing
// ---------------------------------------------------------------------------

fn utf8(id: ArtifactId, content: Vec<u8>) -> Result<String, EngineError> {
    String::from_utf8(content).map_err(|e| EngineError::MalformedArtifact {
        artifact_id: id,
        expected: "utf-8 text",
        content: String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn parse_float(id: ArtifactId, content: &[u8]) -> Result<f64, EngineError> {
    let text = String::from_utf8_lossy(content);
    text.trim()
        .parse::<f64>()
        .map_err(|_| EngineError::MalformedArtifact {
            artifact_id: id,
            expected: "float",
            content: text.into_owned(),
        })
}

fn parse_bool(id: ArtifactId, content: &[u8]) -> Result<bool, EngineError> {
    let text = String::from_utf8_lossy(content);
    match text.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(EngineError::MalformedArtifact {
            artifact_id: id,
            expected: "bool",
            content: text.into_owned(),
        }),
    }
}
