//! GcpRestClient - Google Cloud REST API 共通クライアント
//!
//! - bearer token の付与（TokenSource から取得）
//! - HTTP ステータス → ApiError の分類
//! - long-running operation (LRO) のポーリング
//!
//! Provider ごとに 1 インスタンスを所有する（クライアントは共有しない）。

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config::RestSettings;
use crate::domain::ApiError;
use crate::ports::TokenSource;

/// `google.rpc.Status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// `google.longrunning.Operation`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LongRunningOperation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<RpcStatus>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// An empty JSON object, as sent by `:run` / `:cancel` style calls.
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

/// Authenticated JSON client for one Google Cloud REST endpoint.
pub struct GcpRestClient {
    http: Client,
    settings: RestSettings,
    tokens: Arc<dyn TokenSource>,
}

impl GcpRestClient {
    pub fn new(settings: RestSettings, tokens: Arc<dyn TokenSource>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ApiError::Transient(format!("http client init: {e}")))?;
        Ok(Self {
            http,
            settings,
            tokens,
        })
    }

    pub fn settings(&self) -> &RestSettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.endpoint, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let req = self.http.get(self.url(path)).query(query);
        let body = self.send(req, path).await?;
        decode(&body, path)
    }

    pub async fn post<B, T>(&self, path: &str, query: &[(&str, &str)], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.http.post(self.url(path)).query(query).json(body);
        let body = self.send(req, path).await?;
        decode(&body, path)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let req = self.http.delete(self.url(path));
        self.send(req, path).await.map(|_| ())
    }

    async fn send(&self, req: RequestBuilder, path: &str) -> Result<String, ApiError> {
        let token = self.tokens.access_token().await?;
        let response = req
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("{path}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transient(format!("{path}: reading body: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_http(status, &body, path))
        }
    }

    /// Polls `op` until it is done or `operation_timeout` passes.
    pub async fn wait_operation(
        &self,
        mut op: LongRunningOperation,
    ) -> Result<LongRunningOperation, ApiError> {
        let deadline = Instant::now() + self.settings.operation_timeout;
        loop {
            if op.done {
                return match op.error.take() {
                    Some(status) => Err(classify_rpc(status, &op.name)),
                    None => Ok(op),
                };
            }
            if Instant::now() >= deadline {
                return Err(ApiError::Transient(format!(
                    "operation {} not done after {:?}",
                    op.name, self.settings.operation_timeout
                )));
            }
            debug!(operation = %op.name, "waiting for long-running operation");
            sleep(self.settings.operation_poll_interval).await;
            let name = op.name.clone();
            op = self.get(&name, &[]).await?;
        }
    }

    /// Follows `nextPageToken` until the listing is exhausted.
    pub async fn get_all_pages<P, T>(
        &self,
        path: &str,
        mut items: impl FnMut(P) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>, ApiError>
    where
        P: DeserializeOwned,
    {
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page: P = match token.as_deref() {
                Some(t) => self.get(path, &[("pageToken", t)]).await?,
                None => self.get(path, &[]).await?,
            };
            let (batch, next) = items(page);
            out.extend(batch);
            match next.filter(|t| !t.is_empty()) {
                Some(t) => token = Some(t),
                None => return Ok(out),
            }
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str, path: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
}

/// Maps a non-2xx HTTP response to an [`ApiError`].
pub fn classify_http(status: StatusCode, body: &str, path: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(512).collect());

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            ApiError::Transient(format!("{path}: HTTP {}: {message}", status.as_u16()))
        }
        _ => ApiError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// Maps a failed operation's `google.rpc.Status` to an [`ApiError`].
pub fn classify_rpc(status: RpcStatus, resource: &str) -> ApiError {
    // google.rpc.Code
    match status.code {
        5 => ApiError::NotFound(resource.to_string()),
        4 | 8 | 14 => ApiError::Transient(format!("{resource}: {}", status.message)),
        code => ApiError::Rejected {
            status: http_status_for_rpc(code),
            message: status.message,
        },
    }
}

fn http_status_for_rpc(code: i32) -> u16 {
    match code {
        1 => 499,
        3 | 9 | 11 => 400,
        6 | 10 => 409,
        7 => 403,
        12 => 501,
        16 => 401,
        _ => 500,
    }
}

/// A scripted Google API endpoint on localhost.
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
    use tokio::net::TcpListener;

    use super::GcpRestClient;
    use crate::config::RestSettings;
    use crate::impls::StaticToken;
    use crate::impls::fault::lock;

    pub const TOKEN: &str = "ya29.fake";

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: Method,
        pub path: String,
        pub query: Option<String>,
        pub authorization: Option<String>,
        pub body: String,
    }

    impl Recorded {
        pub fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).expect("json body")
        }
    }

    #[derive(Default)]
    struct Script {
        replies: VecDeque<(StatusCode, String)>,
        seen: Vec<Recorded>,
    }

    /// Replies are served in order and the last one repeats.
    #[derive(Clone, Default)]
    pub struct FakeGcp {
        script: Arc<Mutex<Script>>,
    }

    impl FakeGcp {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, status: u16, body: &str) -> Self {
            let status = StatusCode::from_u16(status).expect("status");
            lock(&self.script)
                .replies
                .push_back((status, body.to_string()));
            self
        }

        pub fn seen(&self) -> Vec<Recorded> {
            lock(&self.script).seen.clone()
        }

        /// Starts serving on an ephemeral port. Returns the base URL.
        pub async fn serve(&self) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            let addr = listener.local_addr().expect("addr");
            let app = Router::new().fallback(answer).with_state(self.clone());
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            format!("http://{addr}")
        }

        /// A client with short polling knobs, pointed at this fake.
        pub async fn client(&self) -> GcpRestClient {
            let settings = RestSettings {
                endpoint: self.serve().await,
                request_timeout: Duration::from_secs(5),
                operation_poll_interval: Duration::from_millis(10),
                operation_timeout: Duration::from_millis(200),
            };
            GcpRestClient::new(settings, Arc::new(StaticToken::new(TOKEN))).expect("client")
        }
    }

    async fn answer(
        State(fake): State<FakeGcp>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        let mut script = lock(&fake.script);
        script.seen.push(Recorded {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        let reply = if script.replies.len() > 1 {
            script.replies.pop_front()
        } else {
            script.replies.front().cloned()
        };
        reply.unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "nothing scripted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found(404, ApiError::NotFound("jobs/x".into()))]
    #[case::throttled(429, ApiError::Transient("jobs/x: HTTP 429: slow down".into()))]
    #[case::unavailable(503, ApiError::Transient("jobs/x: HTTP 503: slow down".into()))]
    #[case::forbidden(403, ApiError::Rejected { status: 403, message: "slow down".into() })]
    #[case::conflict(409, ApiError::Rejected { status: 409, message: "slow down".into() })]
    fn http_errors_are_classified(#[case] code: u16, #[case] expected: ApiError) {
        let body = r#"{"error":{"code":0,"message":"slow down","status":"X"}}"#;
        let status = StatusCode::from_u16(code).unwrap();
        assert_eq!(classify_http(status, body, "jobs/x"), expected);
    }

    #[test]
    fn non_json_error_body_is_kept_as_message() {
        let err = classify_http(StatusCode::BAD_REQUEST, "plain text", "p");
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 400,
                message: "plain text".into()
            }
        );
    }

    #[rstest]
    #[case::not_found(5, true, false)]
    #[case::unavailable(14, false, true)]
    #[case::deadline(4, false, true)]
    #[case::already_exists(6, false, false)]
    fn rpc_errors_are_classified(#[case] code: i32, #[case] not_found: bool, #[case] transient: bool) {
        let err = classify_rpc(
            RpcStatus {
                code,
                message: "m".into(),
            },
            "ops/1",
        );
        assert_eq!(err.is_not_found(), not_found);
        assert_eq!(matches!(err, ApiError::Transient(_)), transient);
    }

    #[test]
    fn already_exists_maps_to_conflict() {
        let err = classify_rpc(
            RpcStatus {
                code: 6,
                message: "exists".into(),
            },
            "jobs/a",
        );
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 409,
                message: "exists".into()
            }
        );
    }

    #[test]
    fn empty_body_decodes_as_empty_object() {
        let op: LongRunningOperation = decode("", "p").unwrap();
        assert!(!op.done);
    }

    use super::fake::{FakeGcp, TOKEN};
    use reqwest::Method;

    fn pending(name: &str) -> LongRunningOperation {
        LongRunningOperation {
            name: name.into(),
            ..LongRunningOperation::default()
        }
    }

    #[tokio::test]
    async fn requests_carry_the_bearer_token_and_404_is_not_found() {
        let fake = FakeGcp::new().reply(404, r#"{"error":{"code":404,"message":"no such job"}}"#);
        let client = fake.client().await;

        let err = client
            .get::<serde_json::Value>("projects/p/locations/r/jobs/x", &[])
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::NotFound("projects/p/locations/r/jobs/x".into()));

        let seen = fake.seen();
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].path, "/projects/p/locations/r/jobs/x");
        assert_eq!(seen[0].authorization, Some(format!("Bearer {TOKEN}")));
    }

    #[tokio::test]
    async fn wait_operation_polls_until_done() {
        let fake = FakeGcp::new()
            .reply(200, r#"{"name":"operations/op-1","done":false}"#)
            .reply(200, r#"{"name":"operations/op-1","done":true,"response":{"name":"jobs/a"}}"#);
        let client = fake.client().await;

        let op = client.wait_operation(pending("operations/op-1")).await.unwrap();
        assert!(op.done);
        assert_eq!(op.response.unwrap()["name"], "jobs/a");

        let seen = fake.seen();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|r| r.path == "/operations/op-1"));
    }

    #[tokio::test]
    async fn finished_operation_with_an_error_is_classified() {
        let fake = FakeGcp::new().reply(
            200,
            r#"{"name":"operations/op-2","done":true,"error":{"code":6,"message":"job exists"}}"#,
        );
        let client = fake.client().await;

        let err = client.wait_operation(pending("operations/op-2")).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 409,
                message: "job exists".into()
            }
        );
    }

    #[tokio::test]
    async fn operation_that_never_finishes_times_out_as_transient() {
        let fake = FakeGcp::new().reply(200, r#"{"name":"operations/op-3","done":false}"#);
        let client = fake.client().await;

        let err = client.wait_operation(pending("operations/op-3")).await.unwrap_err();
        assert!(matches!(&err, ApiError::Transient(m) if m.contains("operations/op-3")), "{err}");
        assert!(fake.seen().len() > 1);
    }

    #[tokio::test]
    async fn already_done_operation_is_not_polled() {
        let fake = FakeGcp::new();
        let client = fake.client().await;

        let mut op = pending("operations/op-4");
        op.done = true;
        client.wait_operation(op).await.unwrap();
        assert!(fake.seen().is_empty());
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Page {
        items: Vec<u32>,
        #[serde(default)]
        next_page_token: Option<String>,
    }

    #[tokio::test]
    async fn pages_are_followed_until_the_token_runs_out() {
        let fake = FakeGcp::new()
            .reply(200, r#"{"items":[1,2],"nextPageToken":"t2"}"#)
            .reply(200, r#"{"items":[3],"nextPageToken":""}"#);
        let client = fake.client().await;

        let items = client
            .get_all_pages("queues/q/tasks", |page: Page| (page.items, page.next_page_token))
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3]);

        let seen = fake.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].query, None);
        assert_eq!(seen[1].query.as_deref(), Some("pageToken=t2"));
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let fake = FakeGcp::new().reply(503, "backend unavailable");
        let client = fake.client().await;

        let err = client.delete("queues/q/tasks/t").await.unwrap_err();
        assert!(matches!(err, ApiError::Transient(_)));
        assert_eq!(fake.seen()[0].method, Method::DELETE);
    }
}
