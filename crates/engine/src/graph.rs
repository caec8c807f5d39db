//! Read-only adjacency index over a [`WorkflowDag`].
//!
//! Built once per run. The scheduler uses it to find an operator's upstream
//! producers and the downstream operators a failure must skip.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ArtifactId, OperatorId, WorkflowDag};

#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    producers: BTreeMap<ArtifactId, Vec<OperatorId>>,
    consumers: BTreeMap<ArtifactId, Vec<OperatorId>>,
    upstream: BTreeMap<OperatorId, BTreeSet<OperatorId>>,
    downstream: BTreeMap<OperatorId, BTreeSet<OperatorId>>,
}

impl DagGraph {
    pub fn build(dag: &WorkflowDag) -> Self {
        let mut graph = Self::default();

        for op in dag.operators.values() {
            graph.upstream.entry(op.id).or_default();
            graph.downstream.entry(op.id).or_default();
            for artifact in &op.outputs {
                graph.producers.entry(*artifact).or_default().push(op.id);
            }
            for artifact in &op.inputs {
                graph.consumers.entry(*artifact).or_default().push(op.id);
            }
        }

        for op in dag.operators.values() {
            for artifact in &op.inputs {
                for producer in graph.producers.get(artifact).into_iter().flatten() {
                    graph.upstream.entry(op.id).or_default().insert(*producer);
                    graph.downstream.entry(*producer).or_default().insert(op.id);
                }
            }
        }

        graph
    }

    /// Operators that write `artifact`. Empty for an artifact nobody produces.
    pub fn producers_of(&self, artifact: ArtifactId) -> &[OperatorId] {
        self.producers.get(&artifact).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn consumers_of(&self, artifact: ArtifactId) -> &[OperatorId] {
        self.consumers.get(&artifact).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Operators producing at least one of `op`'s inputs.
    pub fn upstream_of(&self, op: OperatorId) -> impl Iterator<Item = OperatorId> + '_ {
        self.upstream.get(&op).into_iter().flatten().copied()
    }

    /// Operators consuming at least one of `op`'s outputs.
    pub fn downstream_of(&self, op: OperatorId) -> impl Iterator<Item = OperatorId> + '_ {
        self.downstream.get(&op).into_iter().flatten().copied()
    }

    /// Every operator reachable from `op` through its outputs, `op` excluded
    /// unless it sits on a cycle.
    pub fn transitive_downstream(&self, op: OperatorId) -> BTreeSet<OperatorId> {
        let mut reached = BTreeSet::new();
        let mut stack: Vec<OperatorId> = self.downstream_of(op).collect();

        while let Some(next) = stack.pop() {
            if reached.insert(next) {
                stack.extend(self.downstream_of(next));
            }
        }

        reached
    }

    /// Operators with no upstream producer, in id order.
    pub fn roots(&self) -> Vec<OperatorId> {
        self.upstream
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn operator_count(&self) -> usize {
        self.upstream.len()
    }
}
