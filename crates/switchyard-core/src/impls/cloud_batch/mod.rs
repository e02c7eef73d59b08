//! CloudBatchProvider - heavy tier
//!
//! 1 回の `jobs.create` でコンテナ・計算資源・リトライ回数・割り当てポリシーを
//! まとめて投入する。初期状態は create のレスポンスから求める（通常は QUEUED →
//! Pending）。

mod api;
mod inmem;
mod rest;
mod status;

pub use api::{
    AllocationPolicy, BatchApi, BatchContainer, BatchJobSnapshot, BatchJobSpec, BatchJobStatus,
    BatchState, ComputeResource, Environment, InstancePolicy, InstancePolicyOrTemplate,
    LogsPolicy, Runnable, ServiceAccount, TaskGroupSpec, TaskSpec,
};
pub use inmem::InMemoryBatch;
pub use rest::{CLOUD_BATCH_ENDPOINT, RestBatchApi};
pub use status::map_batch_state;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ProviderConfig;
use crate::domain::{
    ApiError, DispatchError, JobConfig, JobResult, JobStatus, Operation, SERVICE_TYPE_CLOUD_BATCH,
    is_managed_resource,
};
use crate::impls::rest::GcpRestClient;
use crate::ports::{Provider, TokenSource};

const SERVICE: &str = SERVICE_TYPE_CLOUD_BATCH;

/// Compute Engine machine type for the job's VMs (provider or per-job option).
pub const OPT_MACHINE_TYPE: &str = "machine_type";

pub struct CloudBatchProvider<A = RestBatchApi> {
    api: A,
    parent: String,
    machine_type: Option<String>,
}

impl CloudBatchProvider<RestBatchApi> {
    pub fn from_config(
        config: &ProviderConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, DispatchError> {
        let settings = config.rest_settings(CLOUD_BATCH_ENDPOINT)?;
        let client = GcpRestClient::new(settings, tokens)
            .map_err(|e| DispatchError::Configuration(format!("{SERVICE}: {e}")))?;
        Self::with_api(config, RestBatchApi::new(client))
    }
}

impl<A: BatchApi> CloudBatchProvider<A> {
    pub fn with_api(config: &ProviderConfig, api: A) -> Result<Self, DispatchError> {
        config.validate(SERVICE)?;
        Ok(Self {
            api,
            parent: config.location_path(),
            machine_type: config.option(OPT_MACHINE_TYPE).map(str::to_string),
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn job_spec(&self, config: &JobConfig) -> BatchJobSpec {
        let resources = config.resources.unwrap_or_default();
        let compute_resource = ComputeResource {
            cpu_milli: (resources.cpu_millis > 0).then_some(resources.cpu_millis),
            memory_mib: (resources.memory_mib > 0).then_some(resources.memory_mib),
        };
        let task_group = config.task_group.unwrap_or_default();

        let machine_type = config
            .provider_option(OPT_MACHINE_TYPE)
            .or(self.machine_type.as_deref());
        let allocation_policy = AllocationPolicy {
            service_account: config
                .service_account
                .clone()
                .map(|email| ServiceAccount { email }),
            instances: machine_type
                .map(|m| InstancePolicyOrTemplate {
                    policy: InstancePolicy {
                        machine_type: m.to_string(),
                    },
                })
                .into_iter()
                .collect(),
        };

        BatchJobSpec {
            task_groups: vec![TaskGroupSpec {
                task_spec: TaskSpec {
                    runnables: vec![Runnable {
                        container: BatchContainer {
                            image_uri: config.image_uri.clone(),
                            commands: config.commands.clone(),
                            entrypoint: config.container_entrypoint.clone(),
                        },
                    }],
                    compute_resource: (compute_resource != ComputeResource::default())
                        .then_some(compute_resource),
                    max_run_duration: (resources.max_run_duration_secs > 0)
                        .then(|| format!("{}s", resources.max_run_duration_secs)),
                    max_retry_count: (config.max_retry_count > 0)
                        .then_some(config.max_retry_count),
                    environment: (!config.env_vars.is_empty()).then(|| Environment {
                        variables: config.env_vars.clone(),
                    }),
                },
                task_count: task_group.task_count.map(|n| n.get()),
                parallelism: task_group.parallelism.map(|n| n.get()),
            }],
            allocation_policy: (allocation_policy != AllocationPolicy::default())
                .then_some(allocation_policy),
            labels: BTreeMap::from([("managed-by".to_string(), "switchyard".to_string())]),
            logs_policy: Some(LogsPolicy {
                destination: "CLOUD_LOGGING".to_string(),
            }),
        }
    }

    async fn current_status(
        &self,
        resource_path: &str,
        operation: Operation,
    ) -> Result<JobStatus, DispatchError> {
        let job = self
            .api
            .get_job(resource_path)
            .await
            .map_err(|e| DispatchError::from_api(SERVICE, operation, Some(resource_path), e))?;
        Ok(map_batch_state(job.status.state))
    }
}

#[async_trait]
impl<A: BatchApi> Provider for CloudBatchProvider<A> {
    fn service_type(&self) -> &'static str {
        SERVICE
    }

    async fn submit_job(&self, config: &JobConfig) -> Result<JobResult, DispatchError> {
        DispatchError::check_job(SERVICE, config)?;
        let job_id = config.resource_id();
        let spec = self.job_spec(config);

        let created = self
            .api
            .create_job(&self.parent, &job_id, &spec)
            .await
            .map_err(|e| {
                DispatchError::from_api(SERVICE, Operation::Submit { step: "create_job" }, None, e)
            })?;

        let name = if created.name.is_empty() {
            format!("{}/jobs/{job_id}", self.parent)
        } else {
            created.name
        };
        let initial_status = match map_batch_state(created.status.state) {
            JobStatus::Unknown => JobStatus::Pending,
            status => status,
        };
        info!(job_id = %config.job_id, resource = %name, status = %initial_status, service = SERVICE, "batch job created");
        Ok(JobResult::new(name, initial_status))
    }

    async fn get_job_status(&self, resource_path: &str) -> Result<JobStatus, DispatchError> {
        self.current_status(resource_path, Operation::Status).await
    }

    async fn cancel_job(&self, resource_path: &str) -> Result<(), DispatchError> {
        let status = self.current_status(resource_path, Operation::Cancel).await?;
        if status.is_terminal() {
            warn!(resource = %resource_path, %status, service = SERVICE, "batch job already finished, cancel is a no-op");
            return Ok(());
        }

        match self.api.cancel_job(resource_path).await {
            Ok(()) => {
                info!(resource = %resource_path, service = SERVICE, "batch job cancellation requested");
                Ok(())
            }
            Err(e @ ApiError::Transient(_)) => Err(DispatchError::from_api(
                SERVICE,
                Operation::Cancel,
                Some(resource_path),
                e,
            )),
            Err(e) => {
                let now = self.current_status(resource_path, Operation::Cancel).await?;
                if now.is_terminal() {
                    warn!(resource = %resource_path, status = %now, service = SERVICE, "batch job finished before cancel, cancel is a no-op");
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
