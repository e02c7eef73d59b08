//! In-memory Cloud Run Jobs for dev / test.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::api::{CloudRunApi, Condition, ConditionState, ExecutionSnapshot, RunJobSpec};
use super::status::map_execution_status;
use crate::domain::ApiError;
use crate::impls::fault::{FaultPlan, lock};

#[derive(Debug, Clone, Default)]
struct StoredJob {
    spec: RunJobSpec,
    executions: Vec<ExecutionSnapshot>,
}

#[derive(Debug, Default)]
struct State {
    jobs: BTreeMap<String, StoredJob>,
    next_execution: u32,
}

/// Executions start with every count at zero and only move when a test calls
/// [`InMemoryCloudRun::update_execution`].
#[derive(Debug, Default)]
pub struct InMemoryCloudRun {
    state: Mutex<State>,
    faults: FaultPlan,
}

impl InMemoryCloudRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    pub fn spec(&self, job_name: &str) -> Option<RunJobSpec> {
        lock(&self.state).jobs.get(job_name).map(|j| j.spec.clone())
    }

    pub fn executions(&self, job_name: &str) -> Vec<ExecutionSnapshot> {
        lock(&self.state)
            .jobs
            .get(job_name)
            .map(|j| j.executions.clone())
            .unwrap_or_default()
    }

    pub fn update_execution(
        &self,
        execution_name: &str,
        update: impl FnOnce(&mut ExecutionSnapshot),
    ) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        let execution = state
            .jobs
            .values_mut()
            .flat_map(|j| j.executions.iter_mut())
            .find(|e| e.name == execution_name)
            .ok_or_else(|| ApiError::NotFound(execution_name.to_string()))?;
        update(execution);
        Ok(())
    }

    pub fn insert_foreign_job(&self, job_name: &str) {
        lock(&self.state)
            .jobs
            .insert(job_name.to_string(), StoredJob::default());
    }
}

#[async_trait]
impl CloudRunApi for InMemoryCloudRun {
    async fn create_job(
        &self,
        parent: &str,
        job_id: &str,
        spec: &RunJobSpec,
    ) -> Result<String, ApiError> {
        self.faults.check("create_job")?;
        let name = format!("{parent}/jobs/{job_id}");
        let mut state = lock(&self.state);
        if state.jobs.contains_key(&name) {
            return Err(ApiError::Rejected {
                status: 409,
                message: format!("job {name} already exists"),
            });
        }
        state.jobs.insert(
            name,
            StoredJob {
                spec: spec.clone(),
                executions: Vec::new(),
            },
        );
        Ok(format!("{parent}/operations/create-{job_id}"))
    }

    async fn wait_job_created(&self, _operation: &str) -> Result<(), ApiError> {
        self.faults.check("wait_create_job")
    }

    async fn run_job(&self, job_name: &str) -> Result<Option<String>, ApiError> {
        self.faults.check("run_job")?;
        let mut state = lock(&self.state);
        state.next_execution += 1;
        let seq = state.next_execution;
        let job = state
            .jobs
            .get_mut(job_name)
            .ok_or_else(|| ApiError::NotFound(job_name.to_string()))?;

        let job_id = job_name.rsplit('/').next().unwrap_or(job_name);
        let name = format!("{job_name}/executions/{job_id}-{seq:05}");
        job.executions.push(ExecutionSnapshot {
            name: name.clone(),
            create_time: Some(Utc::now() + Duration::milliseconds(i64::from(seq))),
            ..ExecutionSnapshot::default()
        });
        Ok(Some(name))
    }

    async fn list_executions(&self, job_name: &str) -> Result<Vec<ExecutionSnapshot>, ApiError> {
        self.faults.check("list_executions")?;
        lock(&self.state)
            .jobs
            .get(job_name)
            .map(|j| j.executions.clone())
            .ok_or_else(|| ApiError::NotFound(job_name.to_string()))
    }

    async fn cancel_execution(&self, execution_name: &str) -> Result<(), ApiError> {
        self.faults.check("cancel_execution")?;
        let mut state = lock(&self.state);
        let execution = state
            .jobs
            .values_mut()
            .flat_map(|j| j.executions.iter_mut())
            .find(|e| e.name == execution_name)
            .ok_or_else(|| ApiError::NotFound(execution_name.to_string()))?;

        if map_execution_status(execution).is_terminal() {
            return Err(ApiError::Rejected {
                status: 400,
                message: format!("execution {execution_name} has already finished"),
            });
        }
        execution.cancelled_count += execution.running_count.max(1);
        execution.running_count = 0;
        execution
            .conditions
            .push(Condition::new("Cancelled", ConditionState::Succeeded));
        Ok(())
    }

    async fn list_jobs(&self, parent: &str) -> Result<Vec<String>, ApiError> {
        self.faults.check("list_jobs")?;
        let prefix = format!("{parent}/jobs/");
        Ok(lock(&self.state)
            .jobs
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect())
    }
}
