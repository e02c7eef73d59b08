//! Cloud Run execution → JobStatus.
//!
//! 1. terminal conditions (`Completed`, `Failed`, `Cancelled` in
//!    `CONDITION_SUCCEEDED`, or `Completed` in `CONDITION_FAILED`) are merged
//!    with [`JobStatus::most_significant`], so failure outranks success.
//!    `Completed` in `CONDITION_FAILED` counts as cancelled when the
//!    condition's `executionReason` is `CANCELLED` or a task was cancelled
//! 2. running_count > 0 → Running
//! 3. every count zero → Pending
//! 4. anything else → Unknown

use super::api::{Condition, ConditionState, ExecutionSnapshot};
use crate::domain::JobStatus;

const CANCELLED_REASON: &str = "CANCELLED";

fn terminal_signal(condition: &Condition, tasks_cancelled: bool) -> Option<JobStatus> {
    match (condition.kind.as_str(), condition.state) {
        ("Completed", ConditionState::Succeeded) => Some(JobStatus::Completed),
        ("Completed", ConditionState::Failed)
            if tasks_cancelled || condition.execution_reason.as_deref() == Some(CANCELLED_REASON) =>
        {
            Some(JobStatus::Cancelled)
        }
        ("Completed", ConditionState::Failed) => Some(JobStatus::Failed),
        ("Failed", ConditionState::Succeeded) => Some(JobStatus::Failed),
        ("Cancelled", ConditionState::Succeeded) => Some(JobStatus::Cancelled),
        _ => None,
    }
}

pub fn map_execution_status(execution: &ExecutionSnapshot) -> JobStatus {
    let tasks_cancelled = execution.cancelled_count > 0;
    let terminal = JobStatus::most_significant(
        execution
            .conditions
            .iter()
            .filter_map(|c| terminal_signal(c, tasks_cancelled)),
    );
    if terminal != JobStatus::Unknown {
        return terminal;
    }

    if execution.running_count > 0 {
        return JobStatus::Running;
    }
    let counts = [
        execution.succeeded_count,
        execution.failed_count,
        execution.cancelled_count,
    ];
    if counts.iter().all(|&n| n == 0) {
        return JobStatus::Pending;
    }
    JobStatus::Unknown
}

/// The most recently created execution. Ties (or missing timestamps) fall
/// back to the execution name.
pub fn latest_execution(executions: &[ExecutionSnapshot]) -> Option<&ExecutionSnapshot> {
    executions.iter().max_by(|a, b| {
        a.create_time
            .cmp(&b.create_time)
            .then_with(|| a.name.cmp(&b.name))
    })
}
