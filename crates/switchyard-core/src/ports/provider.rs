//! Provider port - バックエンド実行サービスごとの能力インターフェース
//!
//! # 実装
//! - **CloudTasksProvider**: cheap tier（HTTP タスクの非同期ディスパッチ）
//! - **CloudRunJobsProvider**: medium tier（create → run の 2 ステップ）
//! - **CloudBatchProvider**: heavy tier（単一のジョブ定義を投入）

use async_trait::async_trait;

use crate::domain::{DispatchError, JobConfig, JobResult, JobStatus};

/// Uniform job-execution contract implemented once per backend.
///
/// Every method is a single-shot remote call. Dropping the returned future
/// aborts the in-flight request; wrap calls in `tokio::time::timeout` to bound
/// them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier for logs and diagnostics.
    fn service_type(&self) -> &'static str;

    /// Runs the backend's submission protocol.
    ///
    /// When a multi-step submission fails partway, the error names the failed
    /// step and carries the handle of whatever was already created.
    async fn submit_job(&self, config: &JobConfig) -> Result<JobResult, DispatchError>;

    /// Fetches the current logical status. An unknown path is
    /// `DispatchError::NotFound`, never `Ok(JobStatus::Unknown)`.
    async fn get_job_status(&self, resource_path: &str) -> Result<JobStatus, DispatchError>;

    /// Best-effort cancellation. Cancelling a job that is already terminal
    /// (or can no longer be stopped) succeeds as a no-op.
    async fn cancel_job(&self, resource_path: &str) -> Result<(), DispatchError>;

    /// Resource paths created by this system in the provider's namespace.
    async fn list_jobs(&self) -> Result<Vec<String>, DispatchError>;
}
