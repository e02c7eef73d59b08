//! Cloud Batch job state → JobStatus.

use super::api::BatchState;
use crate::domain::JobStatus;

pub fn map_batch_state(state: BatchState) -> JobStatus {
    match state {
        BatchState::Queued | BatchState::Scheduled => JobStatus::Pending,
        BatchState::Running => JobStatus::Running,
        BatchState::Succeeded => JobStatus::Completed,
        BatchState::Failed => JobStatus::Failed,
        BatchState::CancellationInProgress
        | BatchState::Cancelled
        | BatchState::DeletionInProgress => JobStatus::Cancelled,
        BatchState::StateUnspecified => JobStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::cloud_batch::api::BatchJobSnapshot;
    use rstest::rstest;

    #[rstest]
    #[case::queued("QUEUED", JobStatus::Pending)]
    #[case::scheduled("SCHEDULED", JobStatus::Pending)]
    #[case::running("RUNNING", JobStatus::Running)]
    #[case::succeeded("SUCCEEDED", JobStatus::Completed)]
    #[case::failed("FAILED", JobStatus::Failed)]
    #[case::cancelling("CANCELLATION_IN_PROGRESS", JobStatus::Cancelled)]
    #[case::cancelled("CANCELLED", JobStatus::Cancelled)]
    #[case::deleting("DELETION_IN_PROGRESS", JobStatus::Cancelled)]
    #[case::unspecified("STATE_UNSPECIFIED", JobStatus::Unknown)]
    #[case::from_a_newer_api("PAUSED", JobStatus::Unknown)]
    fn maps_recorded_states(#[case] state: &str, #[case] expected: JobStatus) {
        let fixture = format!(
            r#"{{
                "name": "projects/p/locations/r/jobs/switchyard-a",
                "uid": "switchyard-a-3f9c1e2d-0",
                "status": {{ "state": "{state}", "runDuration": "12s" }}
            }}"#
        );
        let job: BatchJobSnapshot = serde_json::from_str(&fixture).expect("fixture");
        assert_eq!(map_batch_state(job.status.state), expected);
    }

    #[test]
    fn missing_status_is_unknown() {
        let job: BatchJobSnapshot =
            serde_json::from_str(r#"{ "name": "projects/p/locations/r/jobs/x" }"#).unwrap();
        assert_eq!(map_batch_state(job.status.state), JobStatus::Unknown);
    }
}
