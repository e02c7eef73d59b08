//! Cloud Tasks task → JobStatus.
//!
//! | native | logical |
//! |---|---|
//! | last attempt answered 2xx (or rpc OK = 0) | Completed |
//! | last attempt answered anything else | Failed |
//! | dispatched, no answer yet | Running |
//! | never dispatched | Pending |

use super::api::TaskSnapshot;
use crate::domain::JobStatus;

pub fn map_task_status(task: &TaskSnapshot) -> JobStatus {
    if let Some(attempt) = &task.last_attempt {
        return match &attempt.response_status {
            Some(resp) if is_success_code(resp.code) => JobStatus::Completed,
            Some(_) => JobStatus::Failed,
            None => JobStatus::Running,
        };
    }
    if task.dispatch_count > 0 {
        return JobStatus::Running;
    }
    JobStatus::Pending
}

fn is_success_code(code: i32) -> bool {
    code == 0 || (200..300).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // Recorded `tasks.get` responses, trimmed to the fields we read.
    const NOT_DISPATCHED: &str = r#"{
        "name": "projects/p/locations/r/queues/q/tasks/switchyard-a",
        "scheduleTime": "2025-03-01T10:00:00Z",
        "createTime": "2025-03-01T10:00:00Z",
        "dispatchDeadline": "600s",
        "view": "BASIC"
    }"#;

    const IN_FLIGHT: &str = r#"{
        "name": "projects/p/locations/r/queues/q/tasks/switchyard-a",
        "dispatchCount": 1,
        "lastAttempt": { "scheduleTime": "2025-03-01T10:00:00Z", "dispatchTime": "2025-03-01T10:00:01Z" }
    }"#;

    const DISPATCHED_NO_ATTEMPT_DETAILS: &str = r#"{
        "name": "projects/p/locations/r/queues/q/tasks/switchyard-a",
        "dispatchCount": 2
    }"#;

    const ANSWERED_200: &str = r#"{
        "name": "projects/p/locations/r/queues/q/tasks/switchyard-a",
        "dispatchCount": 1,
        "responseCount": 1,
        "lastAttempt": {
            "dispatchTime": "2025-03-01T10:00:01Z",
            "responseTime": "2025-03-01T10:00:09Z",
            "responseStatus": { "code": 200, "message": "OK" }
        }
    }"#;

    const ANSWERED_RPC_OK: &str = r#"{
        "name": "projects/p/locations/r/queues/q/tasks/switchyard-a",
        "dispatchCount": 1,
        "lastAttempt": { "responseStatus": {} }
    }"#;

    const ANSWERED_500: &str = r#"{
        "name": "projects/p/locations/r/queues/q/tasks/switchyard-a",
        "dispatchCount": 3,
        "responseCount": 3,
        "lastAttempt": { "responseStatus": { "code": 500, "message": "Internal Server Error" } }
    }"#;

    #[rstest]
    #[case::not_dispatched(NOT_DISPATCHED, JobStatus::Pending)]
    #[case::in_flight(IN_FLIGHT, JobStatus::Running)]
    #[case::dispatch_count_only(DISPATCHED_NO_ATTEMPT_DETAILS, JobStatus::Running)]
    #[case::http_ok(ANSWERED_200, JobStatus::Completed)]
    #[case::rpc_ok(ANSWERED_RPC_OK, JobStatus::Completed)]
    #[case::http_error(ANSWERED_500, JobStatus::Failed)]
    fn maps_recorded_tasks(#[case] fixture: &str, #[case] expected: JobStatus) {
        let task: TaskSnapshot = serde_json::from_str(fixture).expect("fixture");
        assert_eq!(map_task_status(&task), expected);
    }
}
