//! In-memory Cloud Batch for dev / test.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::api::{BatchApi, BatchJobSnapshot, BatchJobSpec, BatchJobStatus, BatchState};
use super::status::map_batch_state;
use crate::domain::ApiError;
use crate::impls::fault::{FaultPlan, lock};

#[derive(Debug, Clone, Default)]
struct StoredJob {
    spec: BatchJobSpec,
    state: BatchState,
}

/// New jobs sit in `QUEUED` until a test moves them with
/// [`InMemoryBatch::set_state`].
#[derive(Debug, Default)]
pub struct InMemoryBatch {
    jobs: Mutex<BTreeMap<String, StoredJob>>,
    faults: FaultPlan,
}

impl InMemoryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    pub fn spec(&self, name: &str) -> Option<BatchJobSpec> {
        lock(&self.jobs).get(name).map(|j| j.spec.clone())
    }

    pub fn set_state(&self, name: &str, state: BatchState) -> Result<(), ApiError> {
        lock(&self.jobs)
            .get_mut(name)
            .map(|j| j.state = state)
            .ok_or_else(|| ApiError::NotFound(name.to_string()))
    }

    pub fn insert_foreign_job(&self, name: &str) {
        lock(&self.jobs).insert(name.to_string(), StoredJob::default());
    }

    fn snapshot(name: &str, job: &StoredJob) -> BatchJobSnapshot {
        BatchJobSnapshot {
            name: name.to_string(),
            status: BatchJobStatus { state: job.state },
        }
    }
}

#[async_trait]
impl BatchApi for InMemoryBatch {
    async fn create_job(
        &self,
        parent: &str,
        job_id: &str,
        spec: &BatchJobSpec,
    ) -> Result<BatchJobSnapshot, ApiError> {
        self.faults.check("create_job")?;
        let name = format!("{parent}/jobs/{job_id}");
        let mut jobs = lock(&self.jobs);
        if jobs.contains_key(&name) {
            return Err(ApiError::Rejected {
                status: 409,
                message: format!("job {name} already exists"),
            });
        }
        let job = StoredJob {
            spec: spec.clone(),
            state: BatchState::Queued,
        };
        let snapshot = Self::snapshot(&name, &job);
        jobs.insert(name, job);
        Ok(snapshot)
    }

    async fn get_job(&self, name: &str) -> Result<BatchJobSnapshot, ApiError> {
        self.faults.check("get_job")?;
        lock(&self.jobs)
            .get(name)
            .map(|job| Self::snapshot(name, job))
            .ok_or_else(|| ApiError::NotFound(name.to_string()))
    }

    async fn cancel_job(&self, name: &str) -> Result<(), ApiError> {
        self.faults.check("cancel_job")?;
        let mut jobs = lock(&self.jobs);
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| ApiError::NotFound(name.to_string()))?;
        if map_batch_state(job.state).is_terminal() {
            return Err(ApiError::Rejected {
                status: 400,
                message: format!("job {name} is in state {:?}", job.state),
            });
        }
        job.state = BatchState::CancellationInProgress;
        Ok(())
    }

    async fn list_jobs(&self, parent: &str) -> Result<Vec<String>, ApiError> {
        self.faults.check("list_jobs")?;
        let prefix = format!("{parent}/jobs/");
        Ok(lock(&self.jobs)
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect())
    }
}
