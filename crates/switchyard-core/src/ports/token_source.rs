//! TokenSource port - OAuth アクセストークンの取得
//!
//! 認証フロー自体は外部の協調者として扱う。REST クライアントはリクエストごとに
//! ここから bearer token を受け取るだけ。

use async_trait::async_trait;

use crate::domain::ApiError;

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ApiError>;
}
