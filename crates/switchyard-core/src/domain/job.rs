//! Job submission request and result.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::status::JobStatus;

/// Prefix of every backend resource this system creates.
/// `list_jobs` uses it to ignore foreign resources.
pub const RESOURCE_PREFIX: &str = "switchyard-";

/// Longest resource id accepted by Cloud Run and Cloud Batch.
const MAX_RESOURCE_ID_LEN: usize = 63;

/// Declared resource needs. Zero means "use the provider default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub cpu_millis: u32,
    #[serde(default)]
    pub memory_mib: u32,
    #[serde(default)]
    pub max_run_duration_secs: u64,
}

impl Resources {
    pub fn new(cpu_millis: u32, memory_mib: u32, max_run_duration_secs: u64) -> Self {
        Self {
            cpu_millis,
            memory_mib,
            max_run_duration_secs,
        }
    }
}

/// How many task instances to run and how many at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    #[serde(default)]
    pub task_count: Option<NonZeroU32>,
    #[serde(default)]
    pub parallelism: Option<NonZeroU32>,
}

/// An immutable submission request.
///
/// Build it with [`JobConfig::new`] and the `with_*` methods; providers only
/// ever receive `&JobConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Caller-assigned unique id. Doubles as the idempotency key.
    pub job_id: String,

    pub image_uri: String,

    #[serde(default)]
    pub commands: Vec<String>,

    /// When set, `commands` become the entrypoint's arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_entrypoint: Option<String>,

    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_group: Option<TaskGroup>,

    #[serde(default)]
    pub max_retry_count: u32,

    /// Identity the job runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Adapter-specific settings (e.g. `target_url`, `machine_type`).
    #[serde(default)]
    pub provider_options: BTreeMap<String, String>,
}

impl JobConfig {
    pub fn new(job_id: impl Into<String>, image_uri: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            image_uri: image_uri.into(),
            commands: Vec::new(),
            container_entrypoint: None,
            env_vars: BTreeMap::new(),
            resources: None,
            task_group: None,
            max_retry_count: 0,
            service_account: None,
            provider_options: BTreeMap::new(),
        }
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.container_entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_task_group(mut self, task_group: TaskGroup) -> Self {
        self.task_group = Some(task_group);
        self
    }

    pub fn with_max_retry_count(mut self, retries: u32) -> Self {
        self.max_retry_count = retries;
        self
    }

    pub fn with_service_account(mut self, email: impl Into<String>) -> Self {
        self.service_account = Some(email.into());
        self
    }

    pub fn with_provider_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provider_options.insert(key.into(), value.into());
        self
    }

    pub fn provider_option(&self, key: &str) -> Option<&str> {
        self.provider_options
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Backend resource id for this job. See [`managed_resource_id`].
    pub fn resource_id(&self) -> String {
        managed_resource_id(&self.job_id)
    }

    /// First required field that is blank, if any.
    pub fn blank_field(&self) -> Option<&'static str> {
        if self.job_id.trim().is_empty() {
            Some("job_id")
        } else if self.image_uri.trim().is_empty() {
            Some("image_uri")
        } else {
            None
        }
    }
}

/// Length of the digest suffix appended to lossy resource ids.
const DIGEST_LEN: usize = 8;

/// Derives a backend-safe resource id (`[a-z0-9-]`, at most 63 chars) that
/// starts with [`RESOURCE_PREFIX`].
///
/// A job id that is already `[a-z0-9-]`, has no leading or trailing dash and
/// fits is used verbatim. Anything else is sanitized, shortened and suffixed
/// with the first hex digits of its SHA-256, so distinct job ids never share
/// a resource id.
pub fn managed_resource_id(job_id: &str) -> String {
    let body: String = job_id
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' }
        })
        .collect();
    let body = body.trim_matches('-');

    let verbatim = !body.is_empty()
        && body == job_id
        && !job_id.starts_with(RESOURCE_PREFIX)
        && RESOURCE_PREFIX.len() + body.len() <= MAX_RESOURCE_ID_LEN;
    if verbatim {
        return format!("{RESOURCE_PREFIX}{body}");
    }

    let digest = format!("{:x}", Sha256::digest(job_id.as_bytes()));
    let digest = &digest[..DIGEST_LEN];
    let room = MAX_RESOURCE_ID_LEN - RESOURCE_PREFIX.len() - DIGEST_LEN - 1;
    let body = body[..body.len().min(room)].trim_end_matches('-');
    if body.is_empty() {
        format!("{RESOURCE_PREFIX}{digest}")
    } else {
        format!("{RESOURCE_PREFIX}{body}-{digest}")
    }
}

/// True when the last segment of a resource path belongs to this system.
pub fn is_managed_resource(resource_path: &str) -> bool {
    resource_path
        .rsplit('/')
        .next()
        .is_some_and(|id| id.starts_with(RESOURCE_PREFIX))
}

/// Handle returned by a successful submission.
///
/// The caller must persist `cloud_resource_path` against the job id; it is the
/// only way to reach the job afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Opaque, backend-native handle.
    pub cloud_resource_path: String,
    pub initial_status: JobStatus,
}

impl JobResult {
    pub fn new(cloud_resource_path: impl Into<String>, initial_status: JobStatus) -> Self {
        Self {
            cloud_resource_path: cloud_resource_path.into(),
            initial_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("job-42", "switchyard-job-42")]
    #[case::ulid_lowercase("01hzx3k9qj5v", "switchyard-01hzx3k9qj5v")]
    fn clean_job_ids_are_used_verbatim(#[case] job_id: &str, #[case] expected: &str) {
        assert_eq!(managed_resource_id(job_id), expected);
    }

    #[rstest]
    #[case::uppercase_and_symbols("Nightly_ETL.v2", "switchyard-nightly-etl-v2-")]
    #[case::already_prefixed("switchyard-abc", "switchyard-switchyard-abc-")]
    #[case::surrounding_dashes("-job-", "switchyard-job-")]
    fn other_job_ids_get_a_digest_suffix(#[case] job_id: &str, #[case] stem: &str) {
        let id = managed_resource_id(job_id);
        let digest = id.strip_prefix(stem).expect("stem");
        assert_eq!(digest.len(), DIGEST_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(managed_resource_id(job_id), id, "stable");
    }

    #[rstest]
    #[case::case_and_punctuation("Report.2025", "report_2025")]
    #[case::sanitized_vs_clean("report.2025", "report-2025")]
    #[case::prefixed_vs_bare("switchyard-abc", "abc")]
    fn distinct_job_ids_never_share_a_resource_id(#[case] a: &str, #[case] b: &str) {
        assert_ne!(managed_resource_id(a), managed_resource_id(b));
    }

    #[test]
    fn long_ids_sharing_a_prefix_stay_distinct() {
        let stem = "x".repeat(70);
        let a = managed_resource_id(&format!("{stem}-a"));
        let b = managed_resource_id(&format!("{stem}-b"));
        assert_ne!(a, b);
        assert_eq!(a.len(), MAX_RESOURCE_ID_LEN);
    }

    #[rstest]
    #[case::empty("")]
    #[case::only_symbols("__..")]
    #[case::whitespace("   ")]
    fn ids_without_alphanumerics_still_have_a_body(#[case] job_id: &str) {
        let id = managed_resource_id(job_id);
        assert_eq!(id.len(), RESOURCE_PREFIX.len() + DIGEST_LEN);
        assert!(is_managed_resource(&format!("jobs/{id}")));
    }

    #[test]
    fn resource_ids_are_truncated_without_trailing_dash() {
        for job_id in ["a-".repeat(60), "b".repeat(80), format!("{}-{}", "c".repeat(42), "d".repeat(20))] {
            let id = managed_resource_id(&job_id);
            assert!(id.len() <= MAX_RESOURCE_ID_LEN, "{id}");
            assert!(id.starts_with(RESOURCE_PREFIX));
            assert!(!id.ends_with('-'));
            assert!(!id.contains("--"), "{id}");
        }
    }

    #[test]
    fn managed_resources_are_recognized_by_last_segment() {
        assert!(is_managed_resource("projects/p/locations/r/jobs/switchyard-a"));
        assert!(!is_managed_resource("projects/p/locations/r/jobs/other-team-job"));
        assert!(!is_managed_resource("projects/switchyard-p/locations/r/jobs/x"));
    }

    #[test]
    fn job_config_from_minimal_json_uses_defaults() {
        let json = r#"{ "job_id": "a", "image_uri": "gcr.io/p/img:1" }"#;
        let config: JobConfig = serde_json::from_str(json).expect("deserialize");
        assert!(config.commands.is_empty());
        assert!(config.resources.is_none());
        assert_eq!(config.max_retry_count, 0);
    }

    #[test]
    fn zero_task_count_is_rejected() {
        let json = r#"{ "task_count": 0 }"#;
        assert!(serde_json::from_str::<TaskGroup>(json).is_err());
    }

    #[test]
    fn blank_required_fields_are_reported_in_order() {
        assert_eq!(JobConfig::new("", "").blank_field(), Some("job_id"));
        assert_eq!(JobConfig::new("a", " ").blank_field(), Some("image_uri"));
        assert_eq!(JobConfig::new("a", "img").blank_field(), None);
    }

    #[test]
    fn empty_provider_option_counts_as_missing() {
        let config = JobConfig::new("a", "img").with_provider_option("target_url", "");
        assert_eq!(config.provider_option("target_url"), None);
    }
}
