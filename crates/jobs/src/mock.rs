//! `MockJobManager`: a scriptable test double for `JobManager`.
//!
//! Behaviour is keyed by operator name. When given a storage handle the mock
//! also plays the part of the job itself: it writes operator metadata and
//! output contents to the paths in the spec, so result collection can be
//! exercised end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use storage::BlobStorage;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{ExecutionStatus, JobError, JobManager, JobManagerConfig, JobSpec};

/// What a scripted job does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehaviour {
    /// Run and finish `Succeeded`.
    Succeed,
    /// Run and finish `Failed`, recording the message as the operator error.
    Fail(String),
    /// Refuse the launch outright.
    RejectLaunch(String),
    /// Report `Canceled` once done.
    Cancel,
}

#[derive(Debug)]
struct MockJob {
    operator_name: String,
    polls: u32,
    outcome: ExecutionStatus,
}

#[derive(Debug, Default)]
struct MockState {
    launched: Vec<String>,
    jobs: HashMap<String, MockJob>,
}

pub struct MockJobManager {
    config: JobManagerConfig,
    default: MockBehaviour,
    overrides: HashMap<String, MockBehaviour>,
    polls_until_done: u32,
    poll_failures: u32,
    outputs: HashMap<String, Vec<Vec<u8>>>,
    storage: Option<Arc<dyn BlobStorage>>,
    state: Mutex<MockState>,
}

impl MockJobManager {
    /// Every job succeeds on its first poll.
    pub fn succeeding() -> Self {
        Self {
            config: JobManagerConfig::Process {
                binary_dir: "bin".into(),
                operator_storage_dir: "operators".into(),
            },
            default: MockBehaviour::Succeed,
            overrides: HashMap::new(),
            polls_until_done: 1,
            poll_failures: 0,
            outputs: HashMap::new(),
            storage: None,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Script the job of the operator called `operator_name`.
    pub fn with_behaviour(mut self, operator_name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        self.overrides.insert(operator_name.into(), behaviour);
        self
    }

    /// Jobs report `Running` until the `n`-th successful poll.
    pub fn with_polls_until_done(mut self, n: u32) -> Self {
        self.polls_until_done = n.max(1);
        self
    }

    /// The first `n` polls of every job fail with a backend error.
    pub fn with_poll_failures(mut self, n: u32) -> Self {
        self.poll_failures = n;
        self
    }

    /// Write job metadata and outputs into `storage` on launch.
    pub fn with_storage(mut self, storage: Arc<dyn BlobStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Contents written, in order, to the operator's output content paths.
    pub fn with_output(mut self, operator_name: impl Into<String>, contents: Vec<Vec<u8>>) -> Self {
        self.outputs.insert(operator_name.into(), contents);
        self
    }

    /// Operator names in the order their jobs were accepted.
    pub fn launched_operators(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .launched
            .iter()
            .filter_map(|name| state.jobs.get(name).map(|j| j.operator_name.clone()))
            .collect()
    }

    /// Number of launches accepted (rejected launches are not counted).
    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap().launched.len()
    }

    /// Total polls seen for the operator's job, failed polls included.
    pub fn poll_count(&self, operator_name: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|j| j.operator_name == operator_name)
            .map(|j| j.polls)
            .sum()
    }

    fn behaviour_for(&self, operator_name: &str) -> &MockBehaviour {
        self.overrides.get(operator_name).unwrap_or(&self.default)
    }

    async fn write_results(&self, spec: &JobSpec, behaviour: &MockBehaviour) -> Result<(), JobError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };

        let backend = |e: storage::StorageError| JobError::Backend(e.to_string());

        let metadata = match behaviour {
            MockBehaviour::Fail(msg) => json!({ "error": msg, "logs": {} }),
            _ => json!({ "error": "", "logs": { "stdout": format!("ran {}", spec.operator_name) } }),
        };
        storage
            .put(&spec.metadata_path, metadata.to_string().into_bytes())
            .await
            .map_err(backend)?;

        if *behaviour == MockBehaviour::Succeed {
            if let Some(contents) = self.outputs.get(&spec.operator_name) {
                for (path, content) in spec.output_content_paths.iter().zip(contents) {
                    storage.put(path, content.clone()).await.map_err(backend)?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl JobManager for MockJobManager {
    fn config(&self) -> JobManagerConfig {
        self.config.clone()
    }

    async fn launch(&self, name: &str, spec: &JobSpec, cancel: &CancellationToken) -> Result<(), JobError> {
        if cancel.is_cancelled() {
            return Err(JobError::Canceled(name.to_owned()));
        }
        let behaviour = self.behaviour_for(&spec.operator_name).clone();

        let outcome = match &behaviour {
            MockBehaviour::RejectLaunch(msg) => {
                debug!(job_name = %name, operator = %spec.operator_name, "mock rejecting launch");
                return Err(JobError::LaunchRejected {
                    job_name: name.to_owned(),
                    message: msg.clone(),
                });
            }
            MockBehaviour::Succeed => ExecutionStatus::Succeeded,
            MockBehaviour::Fail(_) => ExecutionStatus::Failed,
            MockBehaviour::Cancel => ExecutionStatus::Canceled,
        };

        {
            let mut state = self.state.lock().unwrap();
            if state.jobs.contains_key(name) {
                return Err(JobError::JobAlreadyExists(name.to_owned()));
            }
            state.launched.push(name.to_owned());
            state.jobs.insert(
                name.to_owned(),
                MockJob {
                    operator_name: spec.operator_name.clone(),
                    polls: 0,
                    outcome,
                },
            );
        }
        debug!(job_name = %name, operator = %spec.operator_name, ?outcome, "mock job launched");

        self.write_results(spec, &behaviour).await
    }

    async fn poll(&self, name: &str, cancel: &CancellationToken) -> Result<ExecutionStatus, JobError> {
        if cancel.is_cancelled() {
            return Err(JobError::Canceled(name.to_owned()));
        }
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(name)
            .ok_or_else(|| JobError::JobNotExist(name.to_owned()))?;

        job.polls += 1;
        if job.polls <= self.poll_failures {
            debug!(job_name = %name, polls = job.polls, "mock poll failing");
            return Err(JobError::Backend(format!("transient poll failure for '{name}'")));
        }
        let status = if job.polls - self.poll_failures < self.polls_until_done {
            ExecutionStatus::Running
        } else {
            job.outcome
        };
        debug!(job_name = %name, polls = job.polls, %status, "mock poll");
        Ok(status)
    }
}
