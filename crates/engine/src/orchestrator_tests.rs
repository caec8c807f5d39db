//! Scenario tests for the preview scheduler.
//!
//! Jobs run against `MockJobManager`, or `StuckBackend` when a backend call
//! must never return; time is paused so poll intervals, deadlines and
//! cancellation happen instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobs::mock::{MockBehaviour, MockJobManager};
use jobs::{
    ExecutionStatus, JobError, JobManager, JobManagerConfig, JobSpec, SecretStoreConfig,
    StaticSecretStore,
};
use storage::StorageConfig;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{Orchestrator, RunReport};
use crate::paths::WorkflowStoragePaths;
use crate::state::OperatorState;
use crate::test_support::{basic_dag, BasicDag};
use crate::{EngineError, PreviewConfig, ValidationError};

/// A backend that accepts launches and then never answers, or never
/// answers at all.
struct StuckBackend {
    stuck_launch: bool,
}

#[async_trait]
impl JobManager for StuckBackend {
    fn config(&self) -> JobManagerConfig {
        JobManagerConfig::Process {
            binary_dir: "bin".into(),
            operator_storage_dir: "operators".into(),
        }
    }

    async fn launch(&self, _name: &str, _spec: &JobSpec, _cancel: &CancellationToken) -> Result<(), JobError> {
        if self.stuck_launch {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn poll(&self, _name: &str, _cancel: &CancellationToken) -> Result<ExecutionStatus, JobError> {
        std::future::pending().await
    }
}

fn orchestrator(jobs: Arc<dyn JobManager>, config: PreviewConfig) -> Orchestrator {
    Orchestrator::new(
        jobs,
        Arc::new(StaticSecretStore::new(SecretStoreConfig::File {
            directory: "secrets".into(),
        })),
        StorageConfig::File {
            directory: "storage".into(),
        },
        config,
    )
}

async fn run(f: &BasicDag, jobs: MockJobManager) -> (Result<RunReport, EngineError>, Arc<MockJobManager>) {
    let jobs = Arc::new(jobs);
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let result = orchestrator(jobs.clone(), PreviewConfig::default())
        .preview(&f.dag, &paths, &CancellationToken::new())
        .await;
    (result, jobs)
}

// ============================================================
// Happy path
// ============================================================

#[tokio::test(start_paused = true)]
async fn every_operator_succeeds() {
    let f = basic_dag();
    let (result, jobs) = run(&f, MockJobManager::succeeding()).await;
    let report = result.unwrap();

    assert_eq!(report.status, ExecutionStatus::Succeeded);
    assert_eq!(report.operators.len(), 4);
    assert!(report.operators.values().all(|s| *s == OperatorState::Succeeded));
    assert!(report.launch_errors.is_empty());
    assert_eq!(jobs.launch_count(), 4);
    assert!(report.finished_at >= report.started_at);
}

#[tokio::test(start_paused = true)]
async fn consumers_launch_only_after_all_producers_succeed() {
    let f = basic_dag();
    let (result, jobs) = run(&f, MockJobManager::succeeding().with_polls_until_done(3)).await;
    let report = result.unwrap();

    assert_eq!(report.dispatch_order, vec![f.extract0, f.extract1, f.func0, f.load0]);
    assert_eq!(jobs.launched_operators(), vec!["extract0", "extract1", "func0", "load0"]);
    assert_eq!(jobs.poll_count("extract0"), 3);
    assert_eq!(jobs.poll_count("load0"), 3);
}

#[tokio::test(start_paused = true)]
async fn dispatch_order_is_stable_across_runs() {
    let f = basic_dag();
    let (first, first_jobs) = run(&f, MockJobManager::succeeding()).await;
    let (second, second_jobs) = run(&f, MockJobManager::succeeding()).await;

    assert_eq!(first.unwrap().dispatch_order, second.unwrap().dispatch_order);
    assert_eq!(first_jobs.launched_operators(), second_jobs.launched_operators());
}

// ============================================================
// Failures
// ============================================================

#[tokio::test(start_paused = true)]
async fn failed_operator_skips_downstream() {
    let f = basic_dag();
    let jobs = MockJobManager::succeeding().with_behaviour("func0", MockBehaviour::Fail("boom".into()));
    let (result, jobs) = run(&f, jobs).await;
    let report = result.unwrap();

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert_eq!(report.state(f.extract0), Some(OperatorState::Succeeded));
    assert_eq!(report.state(f.func0), Some(OperatorState::Failed));
    assert_eq!(report.state(f.load0), Some(OperatorState::Skipped));
    assert!(!jobs.launched_operators().contains(&"load0".to_string()));
}

#[tokio::test(start_paused = true)]
async fn rejected_launch_fails_the_operator() {
    let f = basic_dag();
    let jobs = MockJobManager::succeeding()
        .with_behaviour("extract1", MockBehaviour::RejectLaunch("quota exceeded".into()));
    let (result, jobs) = run(&f, jobs).await;
    let report = result.unwrap();

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert_eq!(report.state(f.extract1), Some(OperatorState::Failed));
    assert_eq!(report.state(f.func0), Some(OperatorState::Skipped));
    assert_eq!(report.state(f.load0), Some(OperatorState::Skipped));
    assert!(report.launch_errors[&f.extract1].contains("quota exceeded"));
    assert_eq!(jobs.launched_operators(), vec!["extract0"]);
}

#[tokio::test(start_paused = true)]
async fn backend_cancel_is_a_failure() {
    let f = basic_dag();
    let jobs = MockJobManager::succeeding().with_behaviour("extract0", MockBehaviour::Cancel);
    let (result, _) = run(&f, jobs).await;
    let report = result.unwrap();

    assert_eq!(report.state(f.extract0), Some(OperatorState::Failed));
    assert_eq!(report.state(f.extract1), Some(OperatorState::Succeeded));
    assert_eq!(report.status, ExecutionStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_are_retried() {
    let f = basic_dag();
    let (result, jobs) = run(&f, MockJobManager::succeeding().with_poll_failures(2)).await;
    let report = result.unwrap();

    assert_eq!(report.status, ExecutionStatus::Succeeded);
    assert_eq!(jobs.poll_count("func0"), 3);
}

#[tokio::test]
async fn invalid_dag_launches_nothing() {
    let mut f = basic_dag();
    f.dag.operators.get_mut(&f.extract0).unwrap().inputs.push(f.art2);

    let (result, jobs) = run(&f, MockJobManager::succeeding()).await;

    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::UnexecutableOperator))
    ));
    assert_eq!(jobs.launch_count(), 0);
}

// ============================================================
// Cancellation & deadlines
// ============================================================

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_dispatched_jobs() {
    let f = basic_dag();
    let jobs = Arc::new(MockJobManager::succeeding().with_polls_until_done(1_000));
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        trigger.cancel();
    });

    let result = orchestrator(jobs.clone(), PreviewConfig::default())
        .preview(&f.dag, &paths, &cancel)
        .await;

    assert!(matches!(result, Err(EngineError::Canceled { dispatched: 2 })));
    assert_eq!(jobs.launch_count(), 2);

    // No polling after cancellation.
    let polls = jobs.poll_count("extract0");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(jobs.poll_count("extract0"), polls);
}

#[tokio::test(start_paused = true)]
async fn already_canceled_token_launches_nothing() {
    let f = basic_dag();
    let jobs = Arc::new(MockJobManager::succeeding());
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = orchestrator(jobs.clone(), PreviewConfig::default())
        .preview(&f.dag, &paths, &cancel)
        .await;

    assert!(matches!(result, Err(EngineError::Canceled { dispatched: 0 })));
    assert_eq!(jobs.launch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_a_stuck_run() {
    let f = basic_dag();
    let jobs = Arc::new(MockJobManager::succeeding().with_polls_until_done(u32::MAX));
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let config = PreviewConfig::default().with_timeout(Duration::from_secs(2));

    let result = orchestrator(jobs.clone(), config)
        .preview(&f.dag, &paths, &CancellationToken::new())
        .await;

    match result {
        Err(EngineError::DeadlineExceeded { timeout, dispatched }) => {
            assert_eq!(timeout, Duration::from_secs(2));
            assert_eq!(dispatched, 2);
        }
        other => panic!("expected DeadlineExceeded, got {other:?}"),
    }
    // One poll per 100ms tick, starting immediately.
    assert!(jobs.poll_count("extract0") >= 20);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_poll_that_never_returns() {
    let f = basic_dag();
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let cancel = CancellationToken::new();
    let config = PreviewConfig::default().with_timeout(Duration::from_secs(1));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let orch = orchestrator(Arc::new(StuckBackend { stuck_launch: false }), config);
    let run = orch.preview(&f.dag, &paths, &cancel);
    let result = tokio::time::timeout(Duration::from_secs(60), run)
        .await
        .expect("run should stop once canceled");

    assert!(matches!(result, Err(EngineError::Canceled { dispatched: 2 })));
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_a_poll_that_never_returns() {
    let f = basic_dag();
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let config = PreviewConfig::default().with_timeout(Duration::from_secs(1));

    let cancel = CancellationToken::new();
    let orch = orchestrator(Arc::new(StuckBackend { stuck_launch: false }), config);
    let run = orch.preview(&f.dag, &paths, &cancel);
    let result = tokio::time::timeout(Duration::from_secs(60), run)
        .await
        .expect("run should stop at its deadline");

    assert!(matches!(
        result,
        Err(EngineError::DeadlineExceeded { dispatched: 2, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_a_launch_that_never_returns() {
    let f = basic_dag();
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let config = PreviewConfig::default().with_timeout(Duration::from_secs(1));

    let cancel = CancellationToken::new();
    let orch = orchestrator(Arc::new(StuckBackend { stuck_launch: true }), config);
    let run = orch.preview(&f.dag, &paths, &cancel);
    let result = tokio::time::timeout(Duration::from_secs(60), run)
        .await
        .expect("run should stop at its deadline");

    assert!(matches!(
        result,
        Err(EngineError::DeadlineExceeded { dispatched: 0, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn poll_interval_paces_the_run() {
    let f = basic_dag();
    let jobs = Arc::new(MockJobManager::succeeding().with_polls_until_done(2));
    let paths = WorkflowStoragePaths::generate(&f.dag);
    let config = PreviewConfig::default().with_poll_interval(Duration::from_secs(1));

    let start = tokio::time::Instant::now();
    orchestrator(jobs, config)
        .preview(&f.dag, &paths, &CancellationToken::new())
        .await
        .unwrap();

    // Three stages (roots, func0, load0), each needing two polls one second apart.
    assert!(start.elapsed() >= Duration::from_secs(5));
}

// ============================================================
// Precomputed order
// ============================================================

#[tokio::test(start_paused = true)]
async fn execute_dispatches_in_the_given_order() {
    let f = basic_dag();
    let jobs = Arc::new(MockJobManager::succeeding());
    let paths = WorkflowStoragePaths::generate(&f.dag);

    // Also a valid topological order, just not the id-ordered one.
    let order = vec![f.extract1, f.extract0, f.func0, f.load0];
    let report = orchestrator(jobs.clone(), PreviewConfig::default())
        .execute(&f.dag, order.clone(), &paths, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.dispatch_order, order);
    assert_eq!(jobs.launched_operators(), vec!["extract1", "extract0", "func0", "load0"]);
}
