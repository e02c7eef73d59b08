//! CloudRunJobsProvider - medium tier
//!
//! 投入は 2 ステップ:
//! 1. `jobs.create`（受け付け後、LRO の完了まで待つ）
//! 2. `jobs.run`（実行開始のみ。完了は待たない）
//!
//! 1 の待機中や 2 で失敗した場合、ジョブ名をエラーに載せて返す（呼び出し側が
//! 後始末や再実行を判断できるように）。
//!
//! 状態は最新の execution（create_time 最大）から求める。

mod api;
mod inmem;
mod rest;
mod status;

pub use api::{
    CloudRunApi, Condition, ConditionState, Container, EnvVar, ExecutionSnapshot,
    ExecutionTemplate, ResourceRequirements, RunJobSpec, TaskTemplate,
};
pub use inmem::InMemoryCloudRun;
pub use rest::{CLOUD_RUN_ENDPOINT, RestCloudRunApi};
pub use status::{latest_execution, map_execution_status};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ProviderConfig;
use crate::domain::{
    ApiError, DispatchError, JobConfig, JobResult, JobStatus, Operation,
    SERVICE_TYPE_CLOUD_RUN_JOB, is_managed_resource,
};
use crate::impls::rest::GcpRestClient;
use crate::ports::{Provider, TokenSource};

const SERVICE: &str = SERVICE_TYPE_CLOUD_RUN_JOB;

/// Label put on every job this system creates.
pub const MANAGED_BY_LABEL: (&str, &str) = ("managed-by", "switchyard");

/// Translates a job request into a Cloud Run job definition.
///
/// With an entrypoint, `commands` become its arguments; otherwise they replace
/// the image's command.
pub fn job_spec(config: &JobConfig) -> RunJobSpec {
    let (command, args) = match &config.container_entrypoint {
        Some(entrypoint) => (vec![entrypoint.clone()], config.commands.clone()),
        None => (config.commands.clone(), Vec::new()),
    };

    let mut limits = BTreeMap::new();
    let mut timeout = None;
    if let Some(res) = &config.resources {
        if res.cpu_millis > 0 {
            limits.insert("cpu".to_string(), format!("{}m", res.cpu_millis));
        }
        if res.memory_mib > 0 {
            limits.insert("memory".to_string(), format!("{}Mi", res.memory_mib));
        }
        if res.max_run_duration_secs > 0 {
            timeout = Some(format!("{}s", res.max_run_duration_secs));
        }
    }

    let container = Container {
        image: config.image_uri.clone(),
        command,
        args,
        env: config
            .env_vars
            .iter()
            .map(|(name, value)| EnvVar {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
        resources: (!limits.is_empty()).then_some(ResourceRequirements { limits }),
    };

    let task_group = config.task_group.unwrap_or_default();
    RunJobSpec {
        labels: BTreeMap::from([(
            MANAGED_BY_LABEL.0.to_string(),
            MANAGED_BY_LABEL.1.to_string(),
        )]),
        template: ExecutionTemplate {
            task_count: task_group.task_count.map(|n| n.get()),
            parallelism: task_group.parallelism.map(|n| n.get()),
            template: TaskTemplate {
                containers: vec![container],
                timeout,
                max_retries: (config.max_retry_count > 0).then_some(config.max_retry_count),
                service_account: config.service_account.clone(),
            },
        },
    }
}

pub struct CloudRunJobsProvider<A = RestCloudRunApi> {
    api: A,
    parent: String,
}

impl CloudRunJobsProvider<RestCloudRunApi> {
    pub fn from_config(
        config: &ProviderConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, DispatchError> {
        let settings = config.rest_settings(CLOUD_RUN_ENDPOINT)?;
        let client = GcpRestClient::new(settings, tokens)
            .map_err(|e| DispatchError::Configuration(format!("{SERVICE}: {e}")))?;
        Self::with_api(config, RestCloudRunApi::new(client))
    }
}

impl<A: CloudRunApi> CloudRunJobsProvider<A> {
    pub fn with_api(config: &ProviderConfig, api: A) -> Result<Self, DispatchError> {
        config.validate(SERVICE)?;
        Ok(Self {
            api,
            parent: config.location_path(),
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn latest(
        &self,
        job_name: &str,
        operation: Operation,
    ) -> Result<Option<ExecutionSnapshot>, DispatchError> {
        let executions = self
            .api
            .list_executions(job_name)
            .await
            .map_err(|e| DispatchError::from_api(SERVICE, operation, Some(job_name), e))?;
        Ok(latest_execution(&executions).cloned())
    }
}

#[async_trait]
impl<A: CloudRunApi> Provider for CloudRunJobsProvider<A> {
    fn service_type(&self) -> &'static str {
        SERVICE
    }

    async fn submit_job(&self, config: &JobConfig) -> Result<JobResult, DispatchError> {
        DispatchError::check_job(SERVICE, config)?;
        let job_id = config.resource_id();
        let spec = job_spec(config);

        let job_name = format!("{}/jobs/{job_id}", self.parent);

        let operation = self
            .api
            .create_job(&self.parent, &job_id, &spec)
            .await
            .map_err(|e| {
                DispatchError::from_api(SERVICE, Operation::Submit { step: "create_job" }, None, e)
            })?;
        if let Err(e) = self.api.wait_job_created(&operation).await {
            warn!(
                job_id = %config.job_id,
                resource = %job_name,
                %operation,
                service = SERVICE,
                error = %e,
                "job creation accepted but did not finish"
            );
            return Err(DispatchError::from_api(
                SERVICE,
                Operation::Submit {
                    step: "wait_create_job",
                },
                Some(&job_name),
                e,
            ));
        }
        info!(job_id = %config.job_id, resource = %job_name, service = SERVICE, "job created");

        let execution = match self.api.run_job(&job_name).await {
            Ok(execution) => execution,
            Err(e) => {
                warn!(
                    job_id = %config.job_id,
                    resource = %job_name,
                    service = SERVICE,
                    error = %e,
                    "job created but could not be started"
                );
                return Err(DispatchError::from_api(
                    SERVICE,
                    Operation::Submit { step: "run_job" },
                    Some(&job_name),
                    e,
                ));
            }
        };
        match execution {
            Some(execution) => {
                info!(job_id = %config.job_id, %execution, service = SERVICE, "execution started")
            }
            None => {
                warn!(job_id = %config.job_id, resource = %job_name, service = SERVICE, "execution started without a name")
            }
        }

        Ok(JobResult::new(job_name, JobStatus::Running))
    }

    async fn get_job_status(&self, resource_path: &str) -> Result<JobStatus, DispatchError> {
        Ok(self
            .latest(resource_path, Operation::Status)
            .await?
            .map(|e| map_execution_status(&e))
            .unwrap_or(JobStatus::Pending))
    }

    async fn cancel_job(&self, resource_path: &str) -> Result<(), DispatchError> {
        let Some(execution) = self.latest(resource_path, Operation::Cancel).await? else {
            warn!(resource = %resource_path, service = SERVICE, "no execution to cancel");
            return Ok(());
        };
        let status = map_execution_status(&execution);
        if status.is_terminal() {
            warn!(resource = %resource_path, %status, service = SERVICE, "execution already finished, cancel is a no-op");
            return Ok(());
        }

        match self.api.cancel_execution(&execution.name).await {
            Ok(()) => {
                info!(resource = %resource_path, execution = %execution.name, service = SERVICE, "execution cancelled");
                Ok(())
            }
            Err(e @ ApiError::Transient(_)) => Err(DispatchError::from_api(
                SERVICE,
                Operation::Cancel,
                Some(resource_path),
                e,
            )),
            Err(e) => {
                // Finished between our read and the cancel call?
                let now = self
                    .latest(resource_path, Operation::Cancel)
                    .await?
                    .map(|e| map_execution_status(&e));
                if now.is_some_and(JobStatus::is_terminal) {
                    warn!(resource = %resource_path, service = SERVICE, "execution finished before cancel, cancel is a no-op");
                    return Ok(());
                }
                Err(DispatchError::from_api(
                    SERVICE,
                    Operation::Cancel,
                    Some(resource_path),
                    e,
                ))
            }
        }
    }

    async fn list_jobs(&self) -> Result<Vec<String>, DispatchError> {
        let names = self
            .api
            .list_jobs(&self.parent)
            .await
            .map_err(|e| DispatchError::from_api(SERVICE, Operation::List, Some(&self.parent), e))?;
        Ok(names
            .into_iter()
            .filter(|name| is_managed_resource(name))
            .collect())
    }
}
