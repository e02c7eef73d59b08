//! In-memory Cloud Tasks queue for dev / test.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::api::{Attempt, CloudTasksApi, HttpTask, ResponseStatus, TaskSnapshot};
use crate::domain::ApiError;
use crate::impls::fault::{FaultPlan, lock};

#[derive(Debug, Clone)]
struct StoredTask {
    snapshot: TaskSnapshot,
    request: HttpTask,
}

/// Tasks never dispatch on their own; tests drive them with
/// [`InMemoryCloudTasks::record_attempt`].
#[derive(Debug, Default)]
pub struct InMemoryCloudTasks {
    tasks: Mutex<BTreeMap<String, StoredTask>>,
    faults: FaultPlan,
}

impl InMemoryCloudTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Simulates one delivery of the task. `response_code == None` leaves the
    /// attempt in flight.
    pub fn record_attempt(&self, name: &str, response_code: Option<i32>) -> Result<(), ApiError> {
        let mut tasks = lock(&self.tasks);
        let stored = tasks
            .get_mut(name)
            .ok_or_else(|| ApiError::NotFound(name.to_string()))?;
        let task = &mut stored.snapshot;
        task.dispatch_count += 1;
        let response_status = response_code.map(|code| {
            task.response_count += 1;
            ResponseStatus {
                code,
                message: String::new(),
            }
        });
        task.last_attempt = Some(Attempt {
            response_status,
            ..Attempt::default()
        });
        Ok(())
    }

    /// The HTTP request stored for `name`, as the queue would deliver it.
    pub fn request(&self, name: &str) -> Option<HttpTask> {
        lock(&self.tasks).get(name).map(|t| t.request.clone())
    }

    /// Inserts a task created outside this system.
    pub fn insert_foreign(&self, name: &str) {
        let stored = StoredTask {
            snapshot: TaskSnapshot {
                name: name.to_string(),
                ..TaskSnapshot::default()
            },
            request: HttpTask {
                name: name.to_string(),
                url: String::new(),
                body: Vec::new(),
                service_account: None,
            },
        };
        lock(&self.tasks).insert(name.to_string(), stored);
    }
}

#[async_trait]
impl CloudTasksApi for InMemoryCloudTasks {
    async fn create_task(&self, queue_path: &str, task: &HttpTask) -> Result<TaskSnapshot, ApiError> {
        self.faults.check("create_task")?;
        if !task.name.starts_with(&format!("{queue_path}/tasks/")) {
            return Err(ApiError::Rejected {
                status: 400,
                message: format!("task {} is not in queue {queue_path}", task.name),
            });
        }

        let mut tasks = lock(&self.tasks);
        if tasks.contains_key(&task.name) {
            return Err(ApiError::Rejected {
                status: 409,
                message: format!("task {} already exists", task.name),
            });
        }
        let snapshot = TaskSnapshot {
            name: task.name.clone(),
            ..TaskSnapshot::default()
        };
        tasks.insert(
            task.name.clone(),
            StoredTask {
                snapshot: snapshot.clone(),
                request: task.clone(),
            },
        );
        Ok(snapshot)
    }

    async fn get_task(&self, name: &str) -> Result<TaskSnapshot, ApiError> {
        self.faults.check("get_task")?;
        lock(&self.tasks)
            .get(name)
            .map(|t| t.snapshot.clone())
            .ok_or_else(|| ApiError::NotFound(name.to_string()))
    }

    async fn delete_task(&self, name: &str) -> Result<(), ApiError> {
        self.faults.check("delete_task")?;
        lock(&self.tasks)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(name.to_string()))
    }

    async fn list_tasks(&self, queue_path: &str) -> Result<Vec<String>, ApiError> {
        self.faults.check("list_tasks")?;
        let prefix = format!("{queue_path}/tasks/");
        Ok(lock(&self.tasks)
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect())
    }
}
