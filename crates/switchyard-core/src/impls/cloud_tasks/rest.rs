//! Cloud Tasks v2 over REST.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use super::api::{CloudTasksApi, HttpTask, TaskSnapshot};
use crate::domain::ApiError;
use crate::impls::rest::GcpRestClient;

pub const CLOUD_TASKS_ENDPOINT: &str = "https://cloudtasks.googleapis.com/v2";

#[derive(Debug, Serialize)]
struct CreateTaskRequest<'a> {
    task: TaskBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskBody<'a> {
    name: &'a str,
    http_request: HttpRequest<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequest<'a> {
    url: &'a str,
    http_method: &'static str,
    headers: BTreeMap<&'static str, &'static str>,
    /// base64-encoded
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc_token: Option<OidcToken<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OidcToken<'a> {
    service_account_email: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksResponse {
    #[serde(default)]
    tasks: Vec<TaskSnapshot>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct RestCloudTasksApi {
    client: GcpRestClient,
}

impl RestCloudTasksApi {
    pub fn new(client: GcpRestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudTasksApi for RestCloudTasksApi {
    async fn create_task(&self, queue_path: &str, task: &HttpTask) -> Result<TaskSnapshot, ApiError> {
        let request = CreateTaskRequest {
            task: TaskBody {
                name: &task.name,
                http_request: HttpRequest {
                    url: &task.url,
                    http_method: "POST",
                    headers: BTreeMap::from([("Content-Type", "application/json")]),
                    body: general_purpose::STANDARD.encode(&task.body),
                    oidc_token: task
                        .service_account
                        .as_deref()
                        .map(|email| OidcToken {
                            service_account_email: email,
                        }),
                },
            },
        };
        self.client
            .post(&format!("{queue_path}/tasks"), &[], &request)
            .await
    }

    async fn get_task(&self, name: &str) -> Result<TaskSnapshot, ApiError> {
        self.client.get(name, &[]).await
    }

    async fn delete_task(&self, name: &str) -> Result<(), ApiError> {
        self.client.delete(name).await
    }

    async fn list_tasks(&self, queue_path: &str) -> Result<Vec<String>, ApiError> {
        self.client
            .get_all_pages(&format!("{queue_path}/tasks"), |page: ListTasksResponse| {
                (
                    page.tasks.into_iter().map(|t| t.name).collect(),
                    page.next_page_token,
                )
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::rest::fake::FakeGcp;

    const QUEUE: &str = "projects/p/locations/r/queues/switchyard-simple";

    fn task(service_account: Option<&str>) -> HttpTask {
        HttpTask {
            name: format!("{QUEUE}/tasks/switchyard-a"),
            url: "https://worker.example.com/run".into(),
            body: br#"{"job_id":"a"}"#.to_vec(),
            service_account: service_account.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn create_posts_a_base64_http_task_with_oidc() {
        let fake = FakeGcp::new().reply(200, &format!(r#"{{"name":"{QUEUE}/tasks/switchyard-a"}}"#));
        let api = RestCloudTasksApi::new(fake.client().await);

        let created = api
            .create_task(QUEUE, &task(Some("runner@p.iam.gserviceaccount.com")))
            .await
            .unwrap();
        assert_eq!(created.name, format!("{QUEUE}/tasks/switchyard-a"));

        let seen = &fake.seen()[0];
        assert_eq!(seen.path, format!("/{QUEUE}/tasks"));
        let sent = seen.json();
        let http = &sent["task"]["httpRequest"];
        assert_eq!(sent["task"]["name"], format!("{QUEUE}/tasks/switchyard-a"));
        assert_eq!(http["url"], "https://worker.example.com/run");
        assert_eq!(http["httpMethod"], "POST");
        assert_eq!(http["headers"]["Content-Type"], "application/json");
        assert_eq!(
            http["oidcToken"]["serviceAccountEmail"],
            "runner@p.iam.gserviceaccount.com"
        );
        let body = general_purpose::STANDARD
            .decode(http["body"].as_str().unwrap())
            .unwrap();
        assert_eq!(body, br#"{"job_id":"a"}"#);
    }

    #[tokio::test]
    async fn create_without_service_account_sends_no_oidc_token() {
        let fake = FakeGcp::new().reply(200, "{}");
        let api = RestCloudTasksApi::new(fake.client().await);

        api.create_task(QUEUE, &task(None)).await.unwrap();
        assert!(fake.seen()[0].json()["task"]["httpRequest"].get("oidcToken").is_none());
    }

    #[tokio::test]
    async fn list_collects_task_names_across_pages() {
        let fake = FakeGcp::new()
            .reply(200, &format!(r#"{{"tasks":[{{"name":"{QUEUE}/tasks/a"}}],"nextPageToken":"n"}}"#))
            .reply(200, &format!(r#"{{"tasks":[{{"name":"{QUEUE}/tasks/b"}}]}}"#));
        let api = RestCloudTasksApi::new(fake.client().await);

        assert_eq!(
            api.list_tasks(QUEUE).await.unwrap(),
            vec![format!("{QUEUE}/tasks/a"), format!("{QUEUE}/tasks/b")]
        );
    }
}
