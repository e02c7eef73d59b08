//! Cloud Tasks backend port and the subset of its resources we read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ApiError;

/// A Cloud Tasks task as returned by `tasks.get` / `tasks.create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dispatch_count: u32,
    #[serde(default)]
    pub response_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<Attempt>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<ResponseStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// What the provider asks the backend to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTask {
    /// Full task name: `{queue}/tasks/{id}`.
    pub name: String,
    pub url: String,
    /// JSON payload POSTed to `url`.
    pub body: Vec<u8>,
    /// Identity for the OIDC token attached to the request.
    pub service_account: Option<String>,
}

#[async_trait]
pub trait CloudTasksApi: Send + Sync {
    async fn create_task(&self, queue_path: &str, task: &HttpTask) -> Result<TaskSnapshot, ApiError>;

    async fn get_task(&self, name: &str) -> Result<TaskSnapshot, ApiError>;

    async fn delete_task(&self, name: &str) -> Result<(), ApiError>;

    /// Full names of every task in the queue.
    async fn list_tasks(&self, queue_path: &str) -> Result<Vec<String>, ApiError>;
}
