//! Provider configuration.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DispatchError;

pub const OPT_ENDPOINT: &str = "endpoint";
pub const OPT_REQUEST_TIMEOUT_SECS: &str = "request_timeout_secs";
pub const OPT_OPERATION_POLL_INTERVAL_MS: &str = "operation_poll_interval_ms";
pub const OPT_OPERATION_TIMEOUT_SECS: &str = "operation_timeout_secs";

/// Settings handed to a provider constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub project_id: String,
    pub region: String,

    /// Adapter-specific keys (`target_url`, `queue_id`, `endpoint`, ...).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Reads `<PREFIX>_PROJECT_ID`, `<PREFIX>_REGION` and every
    /// `<PREFIX>_OPT_<KEY>` (stored as lowercase `<key>`).
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    fn from_vars(prefix: &str, vars: impl Iterator<Item = (String, String)>) -> Self {
        let project_key = format!("{prefix}_PROJECT_ID");
        let region_key = format!("{prefix}_REGION");
        let opt_prefix = format!("{prefix}_OPT_");

        let mut config = ProviderConfig::default();
        for (key, value) in vars {
            if key == project_key {
                config.project_id = value;
            } else if key == region_key {
                config.region = value;
            } else if let Some(opt) = key.strip_prefix(&opt_prefix) {
                config.options.insert(opt.to_ascii_lowercase(), value);
            }
        }
        config
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require_option(&self, key: &str, service: &str) -> Result<&str, DispatchError> {
        self.option(key).ok_or_else(|| {
            DispatchError::Configuration(format!("{key} is required in options for {service}"))
        })
    }

    pub fn parse_option<T: FromStr>(&self, key: &str) -> Result<Option<T>, DispatchError> {
        self.option(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    DispatchError::Configuration(format!("option {key}={raw:?} is not valid"))
                })
            })
            .transpose()
    }

    /// Fails fast when the fields every provider needs are empty.
    pub fn validate(&self, service: &str) -> Result<(), DispatchError> {
        if self.project_id.trim().is_empty() {
            return Err(DispatchError::Configuration(format!(
                "project_id is required for {service}"
            )));
        }
        if self.region.trim().is_empty() {
            return Err(DispatchError::Configuration(format!(
                "region is required for {service}"
            )));
        }
        Ok(())
    }

    /// `projects/{project}/locations/{region}`
    pub fn location_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }

    pub fn rest_settings(&self, default_endpoint: &str) -> Result<RestSettings, DispatchError> {
        let defaults = RestSettings::new(default_endpoint);
        Ok(RestSettings {
            endpoint: self
                .option(OPT_ENDPOINT)
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            request_timeout: self
                .parse_option::<u64>(OPT_REQUEST_TIMEOUT_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            operation_poll_interval: self
                .parse_option::<u64>(OPT_OPERATION_POLL_INTERVAL_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.operation_poll_interval),
            operation_timeout: self
                .parse_option::<u64>(OPT_OPERATION_TIMEOUT_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.operation_timeout),
        })
    }
}

/// HTTP-level knobs shared by the REST clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestSettings {
    /// Base URL without trailing slash, e.g. `https://run.googleapis.com/v2`.
    pub endpoint: String,
    pub request_timeout: Duration,
    /// Delay between polls of a long-running operation.
    pub operation_poll_interval: Duration,
    /// Upper bound for waiting on a long-running operation.
    pub operation_timeout: Duration,
}

impl RestSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(30),
            operation_poll_interval: Duration::from_millis(1000),
            operation_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn from_vars_collects_project_region_and_options() {
        let config = ProviderConfig::from_vars(
            "SWITCHYARD",
            vars(&[
                ("SWITCHYARD_PROJECT_ID", "acme"),
                ("SWITCHYARD_REGION", "asia-northeast1"),
                ("SWITCHYARD_OPT_TARGET_URL", "https://worker.example.com/run"),
                ("OTHER_OPT_QUEUE_ID", "ignored"),
            ]),
        );
        assert_eq!(config.project_id, "acme");
        assert_eq!(config.region, "asia-northeast1");
        assert_eq!(config.option("target_url"), Some("https://worker.example.com/run"));
        assert_eq!(config.option("queue_id"), None);
    }

    #[test]
    fn validate_requires_project_and_region() {
        let err = ProviderConfig::new("", "us-central1")
            .validate("cloud_tasks")
            .unwrap_err();
        assert!(err.to_string().contains("project_id"));

        let err = ProviderConfig::new("p", " ").validate("cloud_tasks").unwrap_err();
        assert!(err.to_string().contains("region"));

        assert!(ProviderConfig::new("p", "r").validate("cloud_tasks").is_ok());
    }

    #[test]
    fn rest_settings_use_defaults_and_overrides() {
        let config = ProviderConfig::new("p", "r")
            .with_option(OPT_ENDPOINT, "http://localhost:8123/v2/")
            .with_option(OPT_OPERATION_TIMEOUT_SECS, "5");
        let settings = config.rest_settings("https://run.googleapis.com/v2").unwrap();
        assert_eq!(settings.endpoint, "http://localhost:8123/v2");
        assert_eq!(settings.operation_timeout, Duration::from_secs(5));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn malformed_numeric_option_is_a_configuration_error() {
        let config = ProviderConfig::new("p", "r").with_option(OPT_REQUEST_TIMEOUT_SECS, "soon");
        let err = config.rest_settings("https://x").unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
    }
}
