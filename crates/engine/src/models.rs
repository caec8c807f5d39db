//! Core domain models for the workflow engine.
//!
//! A workflow DAG is bipartite: operators consume and produce artifacts.
//! Operator inputs/outputs are not stored on the operator when persisted;
//! they are derived from the edge set when the DAG is built and attached
//! for in-memory use.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

pub type OperatorId = Uuid;
pub type ArtifactId = Uuid;

// ---------------------------------------------------------------------------
// Operator specs
// ---------------------------------------------------------------------------

/// Connection details for an extract or load against an external integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Service name, e.g. `postgres` or `s3`.
    pub service: String,
    pub integration_id: Uuid,
    /// Service-specific parameters (query, table name, update mode, ...).
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    Warning,
    Error,
}

/// What an operator does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperatorSpec {
    /// User code producing tables or parameters.
    Function { storage_path: String, entry_point: String },
    /// User code producing a single float.
    Metric { storage_path: String, entry_point: String },
    /// User code producing a pass/fail boolean.
    Check {
        storage_path: String,
        entry_point: String,
        level: CheckLevel,
    },
    /// Pull data in from an integration.
    Extract { connector: ConnectorConfig },
    /// Push data out to an integration.
    Load { connector: ConnectorConfig },
}

impl OperatorSpec {
    /// Short lowercase name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Function { .. } => "function",
            Self::Metric { .. } => "metric",
            Self::Check { .. } => "check",
            Self::Extract { .. } => "extract",
            Self::Load { .. } => "load",
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact specs
// ---------------------------------------------------------------------------

/// The shape of the data an artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactSpec {
    Table,
    Float,
    Bool,
    Json,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub spec: OperatorSpec,
    #[serde(default)]
    pub inputs: Vec<ArtifactId>,
    #[serde(default)]
    pub outputs: Vec<ArtifactId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub spec: ArtifactSpec,
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    OperatorToArtifact,
    ArtifactToOperator,
}

/// Persisted form of one operator input or output. `idx` is the position in
/// the operator's input or output list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagEdge {
    pub kind: EdgeKind,
    pub from: Uuid,
    pub to: Uuid,
    pub idx: u32,
}

// ---------------------------------------------------------------------------
// WorkflowDag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A complete workflow graph. Maps are ordered by id so every walk over the
/// DAG is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDag {
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    pub operators: BTreeMap<OperatorId, Operator>,
    #[serde(default)]
    pub artifacts: BTreeMap<ArtifactId, Artifact>,
}

impl WorkflowDag {
    /// Build a DAG from operators and artifacts that already carry their
    /// inputs and outputs.
    pub fn new(
        name: impl Into<String>,
        operators: impl IntoIterator<Item = Operator>,
        artifacts: impl IntoIterator<Item = Artifact>,
    ) -> Self {
        Self {
            metadata: WorkflowMetadata::new(name),
            operators: operators.into_iter().map(|op| (op.id, op)).collect(),
            artifacts: artifacts.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    /// Build a DAG from its persisted pieces, attaching each operator's inputs
    /// and outputs from `edges` ordered by `idx`. Any inputs or outputs the
    /// operators already carry are replaced.
    ///
    /// # Errors
    /// [`EngineError::UnknownOperator`] if an edge names an operator that
    /// isn't in `operators`. Artifact ids are not checked here; that is the
    /// validator's job.
    pub fn from_edges(
        metadata: WorkflowMetadata,
        operators: impl IntoIterator<Item = Operator>,
        artifacts: impl IntoIterator<Item = Artifact>,
        edges: &[DagEdge],
    ) -> Result<Self, EngineError> {
        let mut operators: BTreeMap<OperatorId, Operator> = operators
            .into_iter()
            .map(|mut op| {
                op.inputs.clear();
                op.outputs.clear();
                (op.id, op)
            })
            .collect();

        let mut sorted: Vec<&DagEdge> = edges.iter().collect();
        sorted.sort_by_key(|e| e.idx);

        for edge in sorted {
            match edge.kind {
                EdgeKind::OperatorToArtifact => operators
                    .get_mut(&edge.from)
                    .ok_or(EngineError::UnknownOperator(edge.from))?
                    .outputs
                    .push(edge.to),
                EdgeKind::ArtifactToOperator => operators
                    .get_mut(&edge.to)
                    .ok_or(EngineError::UnknownOperator(edge.to))?
                    .inputs
                    .push(edge.from),
            }
        }

        Ok(Self {
            metadata,
            operators,
            artifacts: artifacts.into_iter().map(|a| (a.id, a)).collect(),
        })
    }

    /// The edge set that [`WorkflowDag::from_edges`] would rebuild this DAG from.
    pub fn edges(&self) -> Vec<DagEdge> {
        let mut edges = Vec::new();
        for op in self.operators.values() {
            for (idx, artifact) in op.inputs.iter().enumerate() {
                edges.push(DagEdge {
                    kind: EdgeKind::ArtifactToOperator,
                    from: *artifact,
                    to: op.id,
                    idx: idx as u32,
                });
            }
            for (idx, artifact) in op.outputs.iter().enumerate() {
                edges.push(DagEdge {
                    kind: EdgeKind::OperatorToArtifact,
                    from: op.id,
                    to: *artifact,
                    idx: idx as u32,
                });
            }
        }
        edges
    }

    /// A copy of this DAG with every `Load` operator removed. Previews never
    /// write to external integrations.
    pub fn without_load_operators(&self) -> Self {
        let mut dag = self.clone();
        dag.operators
            .retain(|_, op| !matches!(op.spec, OperatorSpec::Load { .. }));
        dag
    }
}
