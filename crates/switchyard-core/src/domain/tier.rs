//! Service tiers produced by the router.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which backend should execute a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignedService {
    /// Cheap / simple jobs: async HTTP task dispatch (Cloud Tasks).
    CloudTasksTier,
    /// Medium jobs: serverless batch job (Cloud Run Jobs).
    CloudRunJobTier,
    /// Heavy / complex jobs: batch compute (Cloud Batch).
    CloudBatchTier,
}

pub const SERVICE_TYPE_CLOUD_TASKS: &str = "cloud_tasks";
pub const SERVICE_TYPE_CLOUD_RUN_JOB: &str = "cloud_run_job";
pub const SERVICE_TYPE_CLOUD_BATCH: &str = "cloud_batch";

impl AssignedService {
    pub const ALL: [AssignedService; 3] = [
        AssignedService::CloudTasksTier,
        AssignedService::CloudRunJobTier,
        AssignedService::CloudBatchTier,
    ];

    /// Stable identifier shared with the provider serving this tier.
    pub fn service_type(self) -> &'static str {
        match self {
            AssignedService::CloudTasksTier => SERVICE_TYPE_CLOUD_TASKS,
            AssignedService::CloudRunJobTier => SERVICE_TYPE_CLOUD_RUN_JOB,
            AssignedService::CloudBatchTier => SERVICE_TYPE_CLOUD_BATCH,
        }
    }
}

impl fmt::Display for AssignedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_type())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown service tier `{0}` (expected one of: cloud_tasks, cloud_run_job, cloud_batch)")]
pub struct UnknownTier(pub String);

impl FromStr for AssignedService {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssignedService::ALL
            .into_iter()
            .find(|tier| tier.service_type() == s)
            .ok_or_else(|| UnknownTier(s.to_string()))
    }
}
