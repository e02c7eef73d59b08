use std::env;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use switchyard_core::domain::AssignedService;
use switchyard_core::impls::cloud_tasks::OPT_TARGET_URL;
use switchyard_core::impls::{
    CloudBatchProvider, CloudRunJobsProvider, CloudTasksProvider, InMemoryBatch, InMemoryCloudRun,
    InMemoryCloudTasks, MetadataServerToken, StaticToken,
};
use switchyard_core::ports::{IdGenerator, SystemClock, TokenSource, UlidGenerator};
use switchyard_core::{Dispatcher, DispatcherBuilder, JobConfig, JobStatus, ProviderConfig};

const ENV_PREFIX: &str = "SWITCHYARD";

const USAGE: &str = "usage:
  switchyard-cli submit <job.json> [--wait]
  switchyard-cli status <tier> <resource-path>
  switchyard-cli cancel <tier> <resource-path>
  switchyard-cli list <tier>

tiers: cloud_tasks, cloud_run_job, cloud_batch
env:   SWITCHYARD_PROJECT_ID, SWITCHYARD_REGION, SWITCHYARD_OPT_<KEY>,
       SWITCHYARD_BACKEND=gcp|memory, SWITCHYARD_ACCESS_TOKEN, SWITCHYARD_POLL_SECS";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Submit { job_file: String, wait: bool },
    Status { tier: AssignedService, path: String },
    Cancel { tier: AssignedService, path: String },
    List { tier: AssignedService },
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let command = match args.as_slice() {
        ["submit", file] => Command::Submit {
            job_file: file.to_string(),
            wait: false,
        },
        ["submit", file, "--wait"] | ["submit", "--wait", file] => Command::Submit {
            job_file: file.to_string(),
            wait: true,
        },
        ["status", tier, path] => Command::Status {
            tier: tier.parse()?,
            path: path.to_string(),
        },
        ["cancel", tier, path] => Command::Cancel {
            tier: tier.parse()?,
            path: path.to_string(),
        },
        ["list", tier] => Command::List { tier: tier.parse()? },
        _ => bail!("{USAGE}"),
    };
    Ok(command)
}

/// Reads a job file; a missing or empty `job_id` is generated.
fn load_job(raw: &str, ids: &dyn IdGenerator) -> anyhow::Result<JobConfig> {
    let mut value: Value = serde_json::from_str(raw).context("job file is not valid JSON")?;
    let object = value
        .as_object_mut()
        .context("job file must contain a JSON object")?;

    let has_id = object
        .get("job_id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        object.insert("job_id".into(), Value::String(ids.generate_job_id()));
    }

    serde_json::from_value(value).context("job file does not describe a job")
}

fn token_source() -> anyhow::Result<Arc<dyn TokenSource>> {
    match env::var("SWITCHYARD_ACCESS_TOKEN") {
        Ok(token) if !token.is_empty() => Ok(Arc::new(StaticToken::new(token))),
        _ => Ok(Arc::new(MetadataServerToken::new()?)),
    }
}

fn gcp_dispatcher(config: &ProviderConfig) -> anyhow::Result<Dispatcher> {
    let tokens = token_source()?;
    let mut builder = DispatcherBuilder::new();

    if config.option(OPT_TARGET_URL).is_some() {
        builder = builder.with_cloud_tasks(Arc::new(CloudTasksProvider::from_config(
            config,
            tokens.clone(),
        )?))?;
    } else {
        warn!("SWITCHYARD_OPT_TARGET_URL is not set; cloud_tasks tier disabled");
    }

    let dispatcher = builder
        .with_cloud_run_jobs(Arc::new(CloudRunJobsProvider::from_config(
            config,
            tokens.clone(),
        )?))?
        .with_cloud_batch(Arc::new(CloudBatchProvider::from_config(config, tokens)?))?
        .build()?;
    Ok(dispatcher)
}

/// Same wiring over in-memory backends. State lives only as long as the process.
fn memory_dispatcher(config: &ProviderConfig) -> anyhow::Result<Dispatcher> {
    let mut config = config.clone();
    if config.project_id.is_empty() {
        config.project_id = "local".into();
    }
    if config.region.is_empty() {
        config.region = "local".into();
    }
    if config.option(OPT_TARGET_URL).is_none() {
        config = config.with_option(OPT_TARGET_URL, "http://localhost:8080/run");
    }

    let dispatcher = DispatcherBuilder::new()
        .with_cloud_tasks(Arc::new(CloudTasksProvider::with_api(
            &config,
            InMemoryCloudTasks::new(),
        )?))?
        .with_cloud_run_jobs(Arc::new(CloudRunJobsProvider::with_api(
            &config,
            InMemoryCloudRun::new(),
        )?))?
        .with_cloud_batch(Arc::new(CloudBatchProvider::with_api(
            &config,
            InMemoryBatch::new(),
        )?))?
        .build()?;
    Ok(dispatcher)
}

#[derive(Debug, Serialize)]
struct Submitted<'a> {
    job_id: &'a str,
    tier: AssignedService,
    cloud_resource_path: &'a str,
    initial_status: JobStatus,
}

async fn wait_until_terminal(
    dispatcher: &Dispatcher,
    tier: AssignedService,
    path: &str,
    every: Duration,
) -> anyhow::Result<JobStatus> {
    let mut last = None;
    loop {
        let status = dispatcher.get_job_status(tier, path).await?;
        if last != Some(status) {
            info!(resource = %path, %status, "status changed");
            last = Some(status);
        }
        if status.is_terminal() {
            return Ok(status);
        }
        sleep(every).await;
    }
}

async fn run(command: Command, dispatcher: &Dispatcher) -> anyhow::Result<()> {
    match command {
        Command::Submit { job_file, wait } => {
            let raw = std::fs::read_to_string(&job_file)
                .with_context(|| format!("reading {job_file}"))?;
            let job = load_job(&raw, &UlidGenerator::new(SystemClock))?;

            let (tier, result) = dispatcher.route_and_submit(&job).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&Submitted {
                    job_id: &job.job_id,
                    tier,
                    cloud_resource_path: &result.cloud_resource_path,
                    initial_status: result.initial_status,
                })?
            );

            if wait {
                let every = env::var("SWITCHYARD_POLL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5);
                let status = wait_until_terminal(
                    dispatcher,
                    tier,
                    &result.cloud_resource_path,
                    Duration::from_secs(every),
                )
                .await?;
                println!("{status}");
            }
        }
        Command::Status { tier, path } => {
            println!("{}", dispatcher.get_job_status(tier, &path).await?);
        }
        Command::Cancel { tier, path } => {
            dispatcher.cancel_job(tier, &path).await?;
            println!("cancel requested: {path}");
        }
        Command::List { tier } => {
            for path in dispatcher.list_jobs(tier).await? {
                println!("{path}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = ProviderConfig::from_env(ENV_PREFIX);
    let backend = env::var("SWITCHYARD_BACKEND").unwrap_or_else(|_| "gcp".to_string());
    let dispatcher = match backend.as_str() {
        "gcp" => gcp_dispatcher(&config)?,
        "memory" => memory_dispatcher(&config)?,
        other => bail!("SWITCHYARD_BACKEND must be gcp or memory, got {other:?}"),
    };
    info!(%backend, tiers = ?dispatcher.registered_tiers(), "dispatcher ready");

    run(command, &dispatcher).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|a| a.to_string()).collect()
    }

    struct FixedIds;

    impl IdGenerator for FixedIds {
        fn generate_job_id(&self) -> String {
            "generated-1".into()
        }
    }

    #[test]
    fn parses_each_subcommand() {
        assert_eq!(
            parse_args(&args(&["submit", "job.json", "--wait"])).unwrap(),
            Command::Submit {
                job_file: "job.json".into(),
                wait: true
            }
        );
        assert_eq!(
            parse_args(&args(&["status", "cloud_batch", "projects/p/locations/r/jobs/x"])).unwrap(),
            Command::Status {
                tier: AssignedService::CloudBatchTier,
                path: "projects/p/locations/r/jobs/x".into()
            }
        );
        assert_eq!(
            parse_args(&args(&["list", "cloud_tasks"])).unwrap(),
            Command::List {
                tier: AssignedService::CloudTasksTier
            }
        );
    }

    #[test]
    fn rejects_unknown_tier_and_bad_shapes() {
        assert!(parse_args(&args(&["list", "gpu"])).is_err());
        assert!(parse_args(&args(&["submit"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }

    #[test]
    fn missing_job_id_is_generated() {
        let job = load_job(r#"{ "image_uri": "gcr.io/acme/echo:1" }"#, &FixedIds).unwrap();
        assert_eq!(job.job_id, "generated-1");

        let job = load_job(r#"{ "job_id": "mine", "image_uri": "img" }"#, &FixedIds).unwrap();
        assert_eq!(job.job_id, "mine");
    }

    #[tokio::test]
    async fn memory_backend_submits_end_to_end() {
        let dispatcher = memory_dispatcher(&ProviderConfig::default()).unwrap();
        assert_eq!(dispatcher.registered_tiers().len(), 3);

        let job = load_job(
            r#"{ "image_uri": "img", "resources": { "cpu_millis": 200, "memory_mib": 256 } }"#,
            &FixedIds,
        )
        .unwrap();
        let (tier, result) = dispatcher.route_and_submit(&job).await.unwrap();
        assert_eq!(tier, AssignedService::CloudTasksTier);
        assert_eq!(result.initial_status, JobStatus::Pending);
    }
}
