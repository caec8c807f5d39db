//! Preview execution of a workflow DAG.
//!
//! `Orchestrator` is the async half of the scheduler:
//! 1. Validates the DAG and fixes an execution order.
//! 2. Launches every `Ready` operator on the job backend.
//! 3. Waits one poll interval, then polls every `Dispatched` job.
//! 4. Feeds terminal statuses into [`RunState`], which fails and skips
//!    downstream operators or readies new ones.
//! 5. Stops once nothing is ready or dispatched.
//!
//! A launch error fails the operator; a poll error is logged and retried on
//! the next cycle. Cancellation and the deadline interrupt any of these
//! steps, including a backend call that never returns. Nothing is persisted:
//! this is the dry-run path used for interactive previews.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobs::{ExecutionStatus, JobManager, JobSpec, SecretStore};
use serde::Serialize;
use storage::StorageConfig;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::dag::execution_order;
use crate::graph::DagGraph;
use crate::models::{ArtifactId, Operator, OperatorId, WorkflowDag};
use crate::paths::WorkflowStoragePaths;
use crate::state::{OperatorState, RunState};
use crate::{EngineError, PreviewConfig};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Output of a completed run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// `Succeeded` only if every operator succeeded.
    pub status: ExecutionStatus,
    /// Final state of every operator in the run.
    pub operators: BTreeMap<OperatorId, OperatorState>,
    /// Operators in the order their jobs were accepted.
    pub dispatch_order: Vec<OperatorId>,
    /// Why the backend refused to launch an operator.
    pub launch_errors: BTreeMap<OperatorId, String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn state(&self, op: OperatorId) -> Option<OperatorState> {
        self.operators.get(&op).copied()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one DAG run at a time against a shared job backend.
///
/// The backend and secret store are only read; the orchestrator can be
/// shared across runs.
pub struct Orchestrator {
    job_manager: Arc<dyn JobManager>,
    secret_store: Arc<dyn SecretStore>,
    storage_config: StorageConfig,
    config: PreviewConfig,
}

impl Orchestrator {
    pub fn new(
        job_manager: Arc<dyn JobManager>,
        secret_store: Arc<dyn SecretStore>,
        storage_config: StorageConfig,
        config: PreviewConfig,
    ) -> Self {
        Self {
            job_manager,
            secret_store,
            storage_config,
            config,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Validate `dag`, then run it to completion, writing outputs to `paths`.
    ///
    /// # Errors
    /// - [`EngineError::Validation`] if the DAG is malformed; nothing is launched.
    /// - Anything [`Orchestrator::execute`] returns.
    pub async fn preview(
        &self,
        dag: &WorkflowDag,
        paths: &WorkflowStoragePaths,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let order = execution_order(dag)?;
        self.execute(dag, order, paths, cancel).await
    }

    /// Run `dag` in `order`, which must come from [`execution_order`] on
    /// the same DAG.
    ///
    /// Every backend call and every wait between poll cycles is raced
    /// against `cancel` and the configured deadline, so a backend that never
    /// answers cannot hold the run past either.
    ///
    /// # Errors
    /// - [`EngineError::Canceled`] / [`EngineError::DeadlineExceeded`] if the run
    ///   is abandoned. Jobs already launched are left to the backend.
    /// - [`EngineError::UnknownOperator`] if `order` names an operator missing
    ///   from `dag`.
    /// - [`EngineError::JobSpec`] / [`EngineError::MissingStoragePath`] if a job
    ///   spec can't be built.
    #[instrument(skip_all, fields(workflow = %dag.metadata.name, run_id = tracing::field::Empty))]
    pub async fn execute(
        &self,
        dag: &WorkflowDag,
        order: Vec<OperatorId>,
        paths: &WorkflowStoragePaths,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        info!(operators = order.len(), "starting preview run");

        let started_at = Utc::now();
        let mut run = RunState::new(order, DagGraph::build(dag));
        let mut jobs: BTreeMap<OperatorId, String> = BTreeMap::new();
        let mut dispatch_order = Vec::new();
        let mut launch_errors = BTreeMap::new();

        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let mut ticker = tokio::time::interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if cancel.is_cancelled() {
                return Err(self.abandon(Interrupt::Canceled, &run));
            }

            // ------------------------------------------------------------------
            // Launch everything that is ready.
            // ------------------------------------------------------------------
            for op_id in run.ready() {
                let operator = dag
                    .operators
                    .get(&op_id)
                    .ok_or(EngineError::UnknownOperator(op_id))?;
                let spec = self.job_spec(run_id, operator, paths)?;

                let launched = interruptible(
                    self.job_manager.launch(&spec.job_name, &spec, cancel),
                    cancel,
                    deadline,
                )
                .await
                .map_err(|i| self.abandon(i, &run))?;

                match launched {
                    Ok(()) => {
                        debug!(operator = %operator.name, job_name = %spec.job_name, "operator dispatched");
                        run.mark_dispatched(op_id);
                        dispatch_order.push(op_id);
                        jobs.insert(op_id, spec.job_name);
                    }
                    Err(e) => {
                        warn!(operator = %operator.name, error = %e, "launch rejected; failing operator");
                        launch_errors.insert(op_id, e.to_string());
                        let skipped = run.record(op_id, ExecutionStatus::Failed);
                        if !skipped.is_empty() {
                            info!(operator = %operator.name, skipped = skipped.len(), "skipping downstream operators");
                        }
                    }
                }
            }

            if run.is_finished() {
                break;
            }

            // ------------------------------------------------------------------
            // Wait for the next poll cycle.
            // ------------------------------------------------------------------
            interruptible(ticker.tick(), cancel, deadline)
                .await
                .map_err(|i| self.abandon(i, &run))?;

            // ------------------------------------------------------------------
            // Poll everything in flight.
            // ------------------------------------------------------------------
            for op_id in run.dispatched() {
                let Some(job_name) = jobs.get(&op_id) else {
                    continue;
                };

                let polled = interruptible(self.job_manager.poll(job_name, cancel), cancel, deadline)
                    .await
                    .map_err(|i| self.abandon(i, &run))?;

                match polled {
                    Ok(status) if status.is_terminal() => {
                        info!(job_name = %job_name, %status, "job finished");
                        let skipped = run.record(op_id, status);
                        if !skipped.is_empty() {
                            info!(job_name = %job_name, skipped = skipped.len(), "skipping downstream operators");
                        }
                    }
                    Ok(status) => {
                        debug!(job_name = %job_name, %status, "job still in progress");
                    }
                    Err(e) => {
                        warn!(job_name = %job_name, error = %e, "poll failed; retrying next cycle");
                    }
                }
            }
        }

        let status = run.overall_status();
        info!(%status, "preview finished");

        Ok(RunReport {
            run_id,
            status,
            operators: run.states().clone(),
            dispatch_order,
            launch_errors,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn abandon(&self, interrupt: Interrupt, run: &RunState) -> EngineError {
        let dispatched = run.dispatched().len();
        match interrupt {
            Interrupt::Canceled => {
                warn!(dispatched, "preview canceled; abandoning dispatched jobs");
                EngineError::Canceled { dispatched }
            }
            Interrupt::DeadlineExceeded => {
                warn!(dispatched, "preview deadline exceeded; abandoning dispatched jobs");
                EngineError::DeadlineExceeded {
                    timeout: self.config.timeout.unwrap_or_default(),
                    dispatched,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: build the backend job spec for one operator.
    // -----------------------------------------------------------------------

    fn job_spec(
        &self,
        run_id: Uuid,
        operator: &Operator,
        paths: &WorkflowStoragePaths,
    ) -> Result<JobSpec, EngineError> {
        let task = serde_json::to_value(&operator.spec).map_err(|source| EngineError::JobSpec {
            operator_id: operator.id,
            source,
        })?;

        Ok(JobSpec {
            job_name: job_name(operator, run_id),
            operator_id: operator.id,
            operator_name: operator.name.clone(),
            task,
            storage_config: self.storage_config.clone(),
            secret_store_config: self.secret_store.config(),
            job_manager_config: self.job_manager.config(),
            metadata_path: paths.operator_metadata(operator.id)?.to_owned(),
            input_content_paths: collect_paths(&operator.inputs, |id| paths.artifact_content(id))?,
            input_metadata_paths: collect_paths(&operator.inputs, |id| paths.artifact_metadata(id))?,
            output_content_paths: collect_paths(&operator.outputs, |id| paths.artifact_content(id))?,
            output_metadata_paths: collect_paths(&operator.outputs, |id| paths.artifact_metadata(id))?,
        })
    }
}

fn collect_paths<'a>(
    ids: &[ArtifactId],
    lookup: impl Fn(ArtifactId) -> Result<&'a str, EngineError>,
) -> Result<Vec<String>, EngineError> {
    ids.iter().map(|id| lookup(*id).map(str::to_owned)).collect()
}

/// `<operator name>-<operator id>-<run id>`, with the name reduced to
/// lowercase alphanumerics and dashes.
fn job_name(operator: &Operator, run_id: Uuid) -> String {
    let name: String = operator
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}-{}-{}", name.trim_matches('-'), operator.id, run_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Canceled,
    DeadlineExceeded,
}

/// Await `fut` unless `cancel` fires or `deadline` passes first.
async fn interruptible<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<F::Output, Interrupt> {
    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(Interrupt::Canceled),
        () = deadline_elapsed(deadline) => Err(Interrupt::DeadlineExceeded),
        out = fut => Ok(out),
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
