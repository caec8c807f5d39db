//! Per-run operator state for the scheduler.
//!
//! `RunState` is the synchronous half of the scheduler: it owns every
//! operator's state and applies transitions. The async driver in
//! [`crate::orchestrator`] only decides *when* to launch and poll.

use std::collections::BTreeMap;

use jobs::ExecutionStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::DagGraph;
use crate::models::OperatorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorState {
    /// Some producer of an input hasn't succeeded yet.
    NotReady,
    /// Every producer succeeded; waiting to be launched.
    Ready,
    /// Launched; waiting for the backend to report a terminal status.
    Dispatched,
    Succeeded,
    Failed,
    /// An upstream operator failed, so this one never runs.
    Skipped,
}

impl OperatorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

#[derive(Debug, Clone)]
pub struct RunState {
    order: Vec<OperatorId>,
    graph: DagGraph,
    states: BTreeMap<OperatorId, OperatorState>,
}

impl RunState {
    /// Start a run over `order`, which must be a topological order of the
    /// operators in `graph`. Operators with no producers start `Ready`.
    pub fn new(order: Vec<OperatorId>, graph: DagGraph) -> Self {
        let states = order
            .iter()
            .map(|id| (*id, OperatorState::NotReady))
            .collect();
        let mut run = Self { order, graph, states };
        run.promote_ready();
        run
    }

    pub fn state(&self, op: OperatorId) -> Option<OperatorState> {
        self.states.get(&op).copied()
    }

    pub fn states(&self) -> &BTreeMap<OperatorId, OperatorState> {
        &self.states
    }

    /// `Ready` operators, in execution order.
    pub fn ready(&self) -> Vec<OperatorId> {
        self.in_state(OperatorState::Ready)
    }

    /// `Dispatched` operators, in execution order.
    pub fn dispatched(&self) -> Vec<OperatorId> {
        self.in_state(OperatorState::Dispatched)
    }

    pub fn mark_dispatched(&mut self, op: OperatorId) {
        match self.states.get_mut(&op) {
            Some(state @ OperatorState::Ready) => *state = OperatorState::Dispatched,
            other => warn!(operator_id = %op, state = ?other, "ignoring dispatch of operator that isn't ready"),
        }
    }

    /// Apply a status reported for `op`.
    ///
    /// `Succeeded` moves a dispatched operator to `Succeeded` and readies any
    /// consumer whose producers have now all succeeded. `Failed` and
    /// `Canceled` fail a ready or dispatched operator and skip everything
    /// downstream of it. Non-terminal statuses change nothing.
    ///
    /// Returns the operators newly skipped by this call.
    pub fn record(&mut self, op: OperatorId, status: ExecutionStatus) -> Vec<OperatorId> {
        let Some(current) = self.state(op) else {
            warn!(operator_id = %op, "status reported for operator outside this run");
            return Vec::new();
        };

        match status {
            ExecutionStatus::Succeeded if current == OperatorState::Dispatched => {
                self.states.insert(op, OperatorState::Succeeded);
                self.promote_ready();
                Vec::new()
            }
            ExecutionStatus::Failed | ExecutionStatus::Canceled
                if matches!(current, OperatorState::Ready | OperatorState::Dispatched) =>
            {
                self.states.insert(op, OperatorState::Failed);
                self.skip_downstream(op)
            }
            ExecutionStatus::Pending | ExecutionStatus::Running => Vec::new(),
            _ => {
                warn!(operator_id = %op, state = ?current, %status, "ignoring status for operator in this state");
                Vec::new()
            }
        }
    }

    /// No operator is waiting to be launched or polled.
    pub fn is_finished(&self) -> bool {
        !self
            .states
            .values()
            .any(|s| matches!(s, OperatorState::Ready | OperatorState::Dispatched))
    }

    /// `Succeeded` only when every operator succeeded.
    pub fn overall_status(&self) -> ExecutionStatus {
        if self.states.values().all(|s| *s == OperatorState::Succeeded) {
            ExecutionStatus::Succeeded
        } else {
            ExecutionStatus::Failed
        }
    }

    fn in_state(&self, wanted: OperatorState) -> Vec<OperatorId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.states.get(id) == Some(&wanted))
            .collect()
    }

    fn promote_ready(&mut self) {
        for op in &self.order {
            if self.states.get(op) != Some(&OperatorState::NotReady) {
                continue;
            }
            let satisfied = self
                .graph
                .upstream_of(*op)
                .all(|dep| self.states.get(&dep) == Some(&OperatorState::Succeeded));
            if satisfied {
                debug!(operator_id = %op, "dependencies satisfied; marking Ready");
                self.states.insert(*op, OperatorState::Ready);
            }
        }
    }

    fn skip_downstream(&mut self, failed: OperatorId) -> Vec<OperatorId> {
        let mut skipped = Vec::new();
        for op in self.graph.transitive_downstream(failed) {
            if let Some(state @ OperatorState::NotReady) = self.states.get_mut(&op) {
                *state = OperatorState::Skipped;
                debug!(operator_id = %op, upstream = %failed, "skipping operator after upstream failure");
                skipped.push(op);
            }
        }
        skipped
    }
}
