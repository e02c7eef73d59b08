//! Cloud Run Admin API v2 port and resource shapes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ApiError;

/// Body of `jobs.create` (`google.cloud.run.v2.Job`, only what we set).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunJobSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub template: ExecutionTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
    pub template: TaskTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub containers: Vec<Container>,
    /// Duration string, e.g. `"600s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// `cpu` → `"500m"`, `memory` → `"512Mi"`
    pub limits: BTreeMap<String, String>,
}

/// `google.cloud.run.v2.Execution`, the fields status mapping reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub running_count: u32,
    #[serde(default)]
    pub succeeded_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default)]
    pub cancelled_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub state: ConditionState,
    /// e.g. `CANCELLED`, `NON_ZERO_EXIT_CODE`
    #[serde(
        default,
        rename = "executionReason",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_reason: Option<String>,
}

impl Condition {
    pub fn new(kind: impl Into<String>, state: ConditionState) -> Self {
        Self {
            kind: kind.into(),
            state,
            execution_reason: None,
        }
    }

    pub fn with_execution_reason(mut self, reason: impl Into<String>) -> Self {
        self.execution_reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionState {
    #[serde(rename = "CONDITION_PENDING")]
    Pending,
    #[serde(rename = "CONDITION_RECONCILING")]
    Reconciling,
    #[serde(rename = "CONDITION_FAILED")]
    Failed,
    #[serde(rename = "CONDITION_SUCCEEDED")]
    Succeeded,
    #[default]
    #[serde(rename = "STATE_UNSPECIFIED")]
    #[serde(other)]
    Unspecified,
}

#[async_trait]
pub trait CloudRunApi: Send + Sync {
    /// Sends `jobs.create` as `{parent}/jobs/{job_id}`. Returns the name of
    /// the creation operation.
    async fn create_job(
        &self,
        parent: &str,
        job_id: &str,
        spec: &RunJobSpec,
    ) -> Result<String, ApiError>;

    /// Blocks until the creation operation finishes.
    async fn wait_job_created(&self, operation: &str) -> Result<(), ApiError>;

    /// Starts an execution without waiting for it. Returns the execution name
    /// when the backend reports it.
    async fn run_job(&self, job_name: &str) -> Result<Option<String>, ApiError>;

    /// Every execution of the job, in no particular order.
    async fn list_executions(&self, job_name: &str) -> Result<Vec<ExecutionSnapshot>, ApiError>;

    /// Cancels the execution and waits for the operation.
    async fn cancel_execution(&self, execution_name: &str) -> Result<(), ApiError>;

    async fn list_jobs(&self, parent: &str) -> Result<Vec<String>, ApiError>;
}
