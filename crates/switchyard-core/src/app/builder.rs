//! DispatcherBuilder - Provider の登録とワイヤリング
//!
//! init 時の自己登録（グローバルなレジストリ）は使わない。組み立てコードが
//! 各 Provider を明示的に構築し、ここに渡す。
//!
//! # Fail-fast 設計
//! - 同じ tier への二重登録は ConfigurationError
//! - 1 つも登録せずに build() すると ConfigurationError

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::dispatcher::Dispatcher;
use crate::domain::{AssignedService, DispatchError};
use crate::ports::Provider;

/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .with_cloud_tasks(Arc::new(tasks_provider))?
///     .with_cloud_batch(Arc::new(batch_provider))?
///     .build()?;
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    providers: HashMap<AssignedService, Arc<dyn Provider>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registers `provider` as the only backend for `tier`.
    pub fn register(
        mut self,
        tier: AssignedService,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, DispatchError> {
        if let Some(existing) = self.providers.get(&tier) {
            return Err(DispatchError::Configuration(format!(
                "tier {tier} already has a provider (service_type={})",
                existing.service_type()
            )));
        }
        self.providers.insert(tier, provider);
        Ok(self)
    }

    /// Cheap / simple jobs.
    pub fn with_cloud_tasks(self, provider: Arc<dyn Provider>) -> Result<Self, DispatchError> {
        self.register(AssignedService::CloudTasksTier, provider)
    }

    /// Medium jobs.
    pub fn with_cloud_run_jobs(self, provider: Arc<dyn Provider>) -> Result<Self, DispatchError> {
        self.register(AssignedService::CloudRunJobTier, provider)
    }

    /// Heavy / complex jobs.
    pub fn with_cloud_batch(self, provider: Arc<dyn Provider>) -> Result<Self, DispatchError> {
        self.register(AssignedService::CloudBatchTier, provider)
    }

    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        if self.providers.is_empty() {
            return Err(DispatchError::Configuration(
                "dispatcher needs at least one provider".to_string(),
            ));
        }

        let mut tiers: Vec<_> = self.providers.keys().copied().collect();
        tiers.sort();
        for tier in tiers {
            info!(
                %tier,
                service_type = self.providers[&tier].service_type(),
                "registered provider"
            );
        }

        Ok(Dispatcher::from_registry(self.providers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatcher::tests::StubProvider;

    #[test]
    fn build_without_providers_is_a_configuration_error() {
        let result = DispatcherBuilder::new().build();
        assert!(matches!(result, Err(DispatchError::Configuration(_))));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let result = DispatcherBuilder::new()
            .with_cloud_tasks(StubProvider::arc("a"))
            .unwrap()
            .with_cloud_tasks(StubProvider::arc("b"));
        assert!(matches!(
            result,
            Err(DispatchError::Configuration(msg)) if msg.contains("cloud_tasks")
        ));
    }

    #[test]
    fn build_with_one_provider_succeeds() {
        let dispatcher = DispatcherBuilder::new()
            .with_cloud_batch(StubProvider::arc("batch"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            dispatcher.registered_tiers(),
            vec![AssignedService::CloudBatchTier]
        );
    }
}
