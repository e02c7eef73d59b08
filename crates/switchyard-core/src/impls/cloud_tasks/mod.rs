//! CloudTasksProvider - cheap tier
//!
//! ジョブを HTTP ターゲットタスクとして 1 件 enqueue する。キューがペイロード
//! （job_id / image_uri / commands / env_vars の JSON）を `target_url` へ POST
//! し、実行はその先のワーカーが担う。
//!
//! - タスク名は `{queue}/tasks/{resource_id}`。同じ job_id の再投入は 409
//! - キャンセル = タスク削除。ディスパッチ済みのタスクは止められないので no-op

mod api;
mod inmem;
mod rest;
mod status;

pub use api::{Attempt, CloudTasksApi, HttpTask, ResponseStatus, TaskSnapshot};
pub use inmem::InMemoryCloudTasks;
pub use rest::{CLOUD_TASKS_ENDPOINT, RestCloudTasksApi};
pub use status::map_task_status;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProviderConfig;
use crate::domain::{
    ApiError, DispatchError, JobConfig, JobResult, JobStatus, Operation, SERVICE_TYPE_CLOUD_TASKS,
    is_managed_resource,
};
use crate::impls::rest::GcpRestClient;
use crate::ports::{Provider, TokenSource};

pub const OPT_TARGET_URL: &str = "target_url";
pub const OPT_QUEUE_ID: &str = "queue_id";
pub const DEFAULT_QUEUE_ID: &str = "switchyard-simple";

const SERVICE: &str = SERVICE_TYPE_CLOUD_TASKS;

/// Body the queue POSTs to the worker endpoint.
#[derive(Debug, Serialize)]
struct TaskPayload<'a> {
    job_id: &'a str,
    image_uri: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    commands: &'a [String],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    env_vars: &'a BTreeMap<String, String>,
}

pub struct CloudTasksProvider<A = RestCloudTasksApi> {
    api: A,
    queue_path: String,
    target_url: String,
}

impl CloudTasksProvider<RestCloudTasksApi> {
    pub fn from_config(
        config: &ProviderConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, DispatchError> {
        let settings = config.rest_settings(CLOUD_TASKS_ENDPOINT)?;
        let client = GcpRestClient::new(settings, tokens)
            .map_err(|e| DispatchError::Configuration(format!("{SERVICE}: {e}")))?;
        Self::with_api(config, RestCloudTasksApi::new(client))
    }
}

impl<A: CloudTasksApi> CloudTasksProvider<A> {
    pub fn with_api(config: &ProviderConfig, api: A) -> Result<Self, DispatchError> {
        config.validate(SERVICE)?;
        let target_url = config.require_option(OPT_TARGET_URL, SERVICE)?.to_string();
        let queue_id = config.option(OPT_QUEUE_ID).unwrap_or(DEFAULT_QUEUE_ID);

        Ok(Self {
            api,
            queue_path: format!("{}/queues/{queue_id}", config.location_path()),
            target_url,
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// `projects/{p}/locations/{r}/queues/{queue}`
    pub fn queue_path(&self) -> &str {
        &self.queue_path
    }

    fn owns(&self, resource_path: &str) -> bool {
        resource_path
            .strip_prefix(self.queue_path.as_str())
            .is_some_and(|rest| rest.starts_with("/tasks/"))
    }

    fn ensure_owned(&self, resource_path: &str, operation: Operation) -> Result<(), DispatchError> {
        if self.owns(resource_path) {
            Ok(())
        } else {
            Err(DispatchError::from_api(
                SERVICE,
                operation,
                Some(resource_path),
                ApiError::NotFound(format!("{resource_path} is outside {}", self.queue_path)),
            ))
        }
    }

    fn build_task(&self, config: &JobConfig) -> Result<HttpTask, DispatchError> {
        let payload = TaskPayload {
            job_id: &config.job_id,
            image_uri: &config.image_uri,
            commands: &config.commands,
            env_vars: &config.env_vars,
        };
        let body = serde_json::to_vec(&payload).map_err(|e| {
            DispatchError::from_api(
                SERVICE,
                Operation::Submit {
                    step: "encode_payload",
                },
                None,
                ApiError::Decode(e.to_string()),
            )
        })?;

        Ok(HttpTask {
            name: format!("{}/tasks/{}", self.queue_path, config.resource_id()),
            url: config
                .provider_option(OPT_TARGET_URL)
                .unwrap_or(&self.target_url)
                .to_string(),
            body,
            service_account: config.service_account.clone(),
        })
    }
}

#[async_trait]
impl<A: CloudTasksApi> Provider for CloudTasksProvider<A> {
    fn service_type(&self) -> &'static str {
        SERVICE
    }

    async fn submit_job(&self, config: &JobConfig) -> Result<JobResult, DispatchError> {
        DispatchError::check_job(SERVICE, config)?;
        let task = self.build_task(config)?;
        let created = self
            .api
            .create_task(&self.queue_path, &task)
            .await
            .map_err(|e| {
                DispatchError::from_api(
                    SERVICE,
                    Operation::Submit {
                        step: "create_task",
                    },
                    None,
                    e,
                )
            })?;

        let name = if created.name.is_empty() {
            task.name
        } else {
            created.name
        };
        info!(job_id = %config.job_id, resource = %name, service = SERVICE, "task created");
        Ok(JobResult::new(name, JobStatus::Pending))
    }

    async fn get_job_status(&self, resource_path: &str) -> Result<JobStatus, DispatchError> {
        self.ensure_owned(resource_path, Operation::Status)?;
        let task = self
            .api
            .get_task(resource_path)
            .await
            .map_err(|e| {
                DispatchError::from_api(SERVICE, Operation::Status, Some(resource_path), e)
            })?;
        Ok(map_task_status(&task))
    }

    async fn cancel_job(&self, resource_path: &str) -> Result<(), DispatchError> {
        self.ensure_owned(resource_path, Operation::Cancel)?;

        let current = match self.api.get_task(resource_path).await {
            Ok(task) => map_task_status(&task),
            Err(e) if e.is_not_found() => {
                warn!(resource = %resource_path, service = SERVICE, "task already gone, nothing to cancel");
                return Ok(());
            }
            Err(e) => {
                return Err(DispatchError::from_api(
                    SERVICE,
                    Operation::Cancel,
                    Some(resource_path),
                    e,
                ));
            }
        };
        if current != JobStatus::Pending {
            warn!(resource = %resource_path, status = %current, service = SERVICE, "task already dispatched, cancel is a no-op");
            return Ok(());
        }

        match self.api.delete_task(resource_path).await {
            Ok(()) => {
                info!(resource = %resource_path, service = SERVICE, "task deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(resource = %resource_path, service = SERVICE, "task dispatched before delete, cancel is a no-op");
                Ok(())
            }
            Err(e) => Err(DispatchError::from_api(
                SERVICE,
                Operation::Cancel,
                Some(resource_path),
                e,
            )),
        }
    }

    async fn list_jobs(&self) -> Result<Vec<String>, DispatchError> {
        let names = self
            .api
            .list_tasks(&self.queue_path)
            .await
            .map_err(|e| {
                DispatchError::from_api(SERVICE, Operation::List, Some(&self.queue_path), e)
            })?;
        Ok(names
            .into_iter()
            .filter(|name| is_managed_resource(name))
            .collect())
    }
}
