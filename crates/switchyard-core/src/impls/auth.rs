//! TokenSource implementations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::domain::ApiError;
use crate::impls::rest::classify_http;
use crate::ports::TokenSource;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// A fixed bearer token (e.g. from `gcloud auth print-access-token`).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

/// Fetches the default service account's token from the GCE / Cloud Run
/// metadata server on every call.
pub struct MetadataServerToken {
    http: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl MetadataServerToken {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ApiError::Transient(format!("metadata client init: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        let response = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("metadata server: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transient(format!("metadata server: {e}")))?;
        if !status.is_success() {
            // a 404 here is about the token endpoint, not the job being looked up
            return Err(match classify_http(status, &body, &self.url) {
                ApiError::NotFound(_) => ApiError::Rejected {
                    status: status.as_u16(),
                    message: format!("metadata server has no token at {}", self.url),
                },
                other => other,
            });
        }

        serde_json::from_str::<MetadataToken>(&body)
            .map(|t| t.access_token)
            .map_err(|e| ApiError::Decode(format!("metadata token: {e}")))
    }
}
