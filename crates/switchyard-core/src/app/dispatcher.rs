//! Dispatcher - tier ごとに Provider へ操作を転送する
//!
//! レジストリは構築時に一度だけ作られ、以後は読み取り専用。
//! 転送は純粋: リトライも変換もしない（バックオフは各 Provider の責務）。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::router::Router;
use crate::domain::{AssignedService, DispatchError, JobConfig, JobResult, JobStatus};
use crate::ports::Provider;

/// Routes job operations to the provider registered for a tier.
///
/// Cheap to share: wrap it in an `Arc` and call it from many tasks at once.
pub struct Dispatcher {
    providers: HashMap<AssignedService, Arc<dyn Provider>>,
    router: Router,
}

impl Dispatcher {
    pub(crate) fn from_registry(providers: HashMap<AssignedService, Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            router: Router::new(),
        }
    }

    pub fn provider_for(&self, tier: AssignedService) -> Result<Arc<dyn Provider>, DispatchError> {
        self.providers
            .get(&tier)
            .cloned()
            .ok_or(DispatchError::NotRegistered(tier))
    }

    pub fn registered_tiers(&self) -> Vec<AssignedService> {
        let mut tiers: Vec<_> = self.providers.keys().copied().collect();
        tiers.sort();
        tiers
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn submit_job(
        &self,
        tier: AssignedService,
        config: &JobConfig,
    ) -> Result<JobResult, DispatchError> {
        let provider = self.provider_for(tier)?;
        info!(job_id = %config.job_id, %tier, "routing job");
        provider.submit_job(config).await
    }

    /// Classifies the job, then submits it to that tier.
    ///
    /// The tier is returned with the result: status and cancel calls need both,
    /// so the caller should persist them together.
    pub async fn route_and_submit(
        &self,
        config: &JobConfig,
    ) -> Result<(AssignedService, JobResult), DispatchError> {
        let tier = self.router.route(config.resources.as_ref());
        let result = self.submit_job(tier, config).await?;
        Ok((tier, result))
    }

    pub async fn get_job_status(
        &self,
        tier: AssignedService,
        resource_path: &str,
    ) -> Result<JobStatus, DispatchError> {
        let provider = self.provider_for(tier)?;
        debug!(%tier, resource = resource_path, "forwarding status request");
        provider.get_job_status(resource_path).await
    }

    pub async fn cancel_job(
        &self,
        tier: AssignedService,
        resource_path: &str,
    ) -> Result<(), DispatchError> {
        let provider = self.provider_for(tier)?;
        debug!(%tier, resource = resource_path, "forwarding cancel request");
        provider.cancel_job(resource_path).await
    }

    pub async fn list_jobs(&self, tier: AssignedService) -> Result<Vec<String>, DispatchError> {
        self.provider_for(tier)?.list_jobs().await
    }
}
