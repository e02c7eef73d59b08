//! Domain model (job request/result, logical status, tiers, errors).

pub mod errors;
pub mod job;
pub mod status;
pub mod tier;

pub use self::errors::{ApiError, DispatchError, ErrorKind, Operation};
pub use self::job::{
    JobConfig, JobResult, RESOURCE_PREFIX, Resources, TaskGroup, is_managed_resource,
    managed_resource_id,
};
pub use self::status::JobStatus;
pub use self::tier::{
    AssignedService, SERVICE_TYPE_CLOUD_BATCH, SERVICE_TYPE_CLOUD_RUN_JOB,
    SERVICE_TYPE_CLOUD_TASKS, UnknownTier,
};
