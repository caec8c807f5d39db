//! DAG validation. Run this before persisting or executing a workflow.
//!
//! Rules enforced, in order:
//! 1. The workflow has at least one operator.
//! 2. Every operator input/output names an artifact in the workflow.
//! 3. Every artifact is the output of some operator.
//! 4. The operator graph (op → op' when op' consumes what op produces) has a
//!    topological order, i.e. every operator can eventually run.
//!
//! Validation is pure: it reads the DAG and nothing else.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::graph::DagGraph;
use crate::models::{OperatorId, WorkflowDag};
use crate::ValidationError;

/// Check that `dag` is well formed.
///
/// # Errors
/// One of the four [`ValidationError`] sentinels, for the first rule broken.
pub fn validate(dag: &WorkflowDag) -> Result<(), ValidationError> {
    execution_order(dag).map(|_| ())
}

/// Validate `dag` and return its operators in an order that runs every
/// producer before its consumers. Among operators that become runnable at
/// the same time, the smaller id comes first.
///
/// # Errors
/// Same as [`validate`].
pub fn execution_order(dag: &WorkflowDag) -> Result<Vec<OperatorId>, ValidationError> {
    // -----------------------------------------------------------------------
    // 1. At least one operator
    // -----------------------------------------------------------------------
    if dag.operators.is_empty() {
        return Err(ValidationError::NoOperator);
    }

    // -----------------------------------------------------------------------
    // 2. Every referenced artifact exists
    // -----------------------------------------------------------------------
    for op in dag.operators.values() {
        if let Some(missing) = op
            .inputs
            .iter()
            .chain(&op.outputs)
            .find(|id| !dag.artifacts.contains_key(*id))
        {
            debug!(operator_id = %op.id, artifact_id = %missing, "undefined artifact");
            return Err(ValidationError::UndefinedArtifact);
        }
    }

    // -----------------------------------------------------------------------
    // 3. Every artifact has a producer
    // -----------------------------------------------------------------------
    let produced: HashSet<_> = dag
        .operators
        .values()
        .flat_map(|op| op.outputs.iter())
        .collect();

    if let Some(orphan) = dag.artifacts.keys().find(|id| !produced.contains(id)) {
        debug!(artifact_id = %orphan, "artifact is never produced");
        return Err(ValidationError::UnreachableArtifact);
    }

    // -----------------------------------------------------------------------
    // 4. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    let graph = DagGraph::build(dag);

    let mut in_degree: BTreeMap<OperatorId, usize> = dag
        .operators
        .keys()
        .map(|id| (*id, graph.upstream_of(*id).count()))
        .collect();

    // Ordered so that ties between runnable operators resolve by id.
    let mut ready: BTreeSet<OperatorId> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut sorted: Vec<OperatorId> = Vec::with_capacity(dag.operators.len());

    while let Some(op) = ready.pop_first() {
        sorted.push(op);

        for consumer in graph.downstream_of(op) {
            if let Some(deg) = in_degree.get_mut(&consumer) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(consumer);
                }
            }
        }
    }

    // Anything left over waits on itself, directly or through a cycle.
    if sorted.len() != dag.operators.len() {
        debug!(
            scheduled = sorted.len(),
            total = dag.operators.len(),
            "operators left unschedulable"
        );
        return Err(ValidationError::UnexecutableOperator);
    }

    Ok(sorted)
}
