//! Cloud Batch v1 over REST.

use async_trait::async_trait;
use serde::Deserialize;

use super::api::{BatchApi, BatchJobSnapshot, BatchJobSpec};
use crate::domain::ApiError;
use crate::impls::rest::{Empty, GcpRestClient, LongRunningOperation};

pub const CLOUD_BATCH_ENDPOINT: &str = "https://batch.googleapis.com/v1";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListJobsResponse {
    #[serde(default)]
    jobs: Vec<BatchJobSnapshot>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct RestBatchApi {
    client: GcpRestClient,
}

impl RestBatchApi {
    pub fn new(client: GcpRestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchApi for RestBatchApi {
    async fn create_job(
        &self,
        parent: &str,
        job_id: &str,
        spec: &BatchJobSpec,
    ) -> Result<BatchJobSnapshot, ApiError> {
        self.client
            .post(&format!("{parent}/jobs"), &[("jobId", job_id)], spec)
            .await
    }

    async fn get_job(&self, name: &str) -> Result<BatchJobSnapshot, ApiError> {
        self.client.get(name, &[]).await
    }

    async fn cancel_job(&self, name: &str) -> Result<(), ApiError> {
        let _op: LongRunningOperation = self
            .client
            .post(&format!("{name}:cancel"), &[], &Empty::default())
            .await?;
        Ok(())
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
