//! Cloud Run Admin API v2 over REST.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::api::{CloudRunApi, ExecutionSnapshot, RunJobSpec};
use crate::domain::ApiError;
use crate::impls::rest::{Empty, GcpRestClient, LongRunningOperation};

pub const CLOUD_RUN_ENDPOINT: &str = "https://run.googleapis.com/v2";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListExecutionsResponse {
    #[serde(default)]
    executions: Vec<ExecutionSnapshot>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JobName {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListJobsResponse {
    #[serde(default)]
    jobs: Vec<JobName>,
    #[serde(default)]
    next_page_token: Option<String>,
}

fn name_of(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub struct RestCloudRunApi {
    client: GcpRestClient,
}

impl RestCloudRunApi {
    pub fn new(client: GcpRestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudRunApi for RestCloudRunApi {
    async fn create_job(
        &self,
        parent: &str,
        job_id: &str,
        spec: &RunJobSpec,
    ) -> Result<String, ApiError> {
        let op: LongRunningOperation = self
            .client
            .post(&format!("{parent}/jobs"), &[("jobId", job_id)], spec)
            .await?;
        Ok(op.name)
    }

    async fn wait_job_created(&self, operation: &str) -> Result<(), ApiError> {
        let op = LongRunningOperation {
            name: operation.to_string(),
            ..LongRunningOperation::default()
        };
        self.client.wait_operation(op).await.map(|_| ())
    }

    async fn run_job(&self, job_name: &str) -> Result<Option<String>, ApiError> {
        let op: LongRunningOperation = self
            .client
            .post(&format!("{job_name}:run"), &[], &Empty::default())
            .await?;
        // metadata is the Execution being started
        Ok(name_of(op.metadata.as_ref()))
    }

    async fn list_executions(&self, job_name: &str) -> Result<Vec<ExecutionSnapshot>, ApiError> {
        self.client
            .get_all_pages(
                &format!("{job_name}/executions"),
                |page: ListExecutionsResponse| (page.executions, page.next_page_token),
            )
            .await
    }

    async fn cancel_execution(&self, execution_name: &str) -> Result<(), ApiError> {
        let op: LongRunningOperation = self
            .client
            .post(&format!("{execution_name}:cancel"), &[], &Empty::default())
            .await?;
        self.client.wait_operation(op).await.map(|_| ())
    }

    async fn list_jobs(&self, parent: &str) -> Result<Vec<String>, ApiError> {
        self.client
            .get_all_pages(&format!("{parent}/jobs"), |page: ListJobsResponse| {
                (
                    page.jobs.into_iter().map(|j| j.name).collect(),
                    page.next_page_token,
                )
            })
            .await
    }
}
