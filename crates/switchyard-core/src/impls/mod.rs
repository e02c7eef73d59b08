//! Impls - ports の実装
//!
//! # Provider（tier ごとに 1 つ）
//! - **CloudTasksProvider**: cheap tier
//! - **CloudRunJobsProvider**: medium tier
//! - **CloudBatchProvider**: heavy tier
//!
//! 各 Provider はバックエンド API trait（`CloudTasksApi` / `CloudRunApi` /
//! `BatchApi`）越しに通信する。本番は REST 実装、開発・テストは in-memory 実装
//! （`InMemoryCloudTasks` / `InMemoryCloudRun` / `InMemoryBatch`）を差し込む。
//!
//! # 共通部品
//! - **GcpRestClient**: bearer token 付き JSON クライアント + LRO ポーリング
//! - **StaticToken / MetadataServerToken**: TokenSource 実装
//! - **FaultPlan**: in-memory バックエンドへの障害注入

pub mod auth;
pub mod cloud_batch;
pub mod cloud_run;
pub mod cloud_tasks;
pub mod fault;
pub mod rest;

// 主要な型を再エクスポート
pub use self::auth::{MetadataServerToken, StaticToken};
pub use self::cloud_batch::{CloudBatchProvider, InMemoryBatch};
pub use self::cloud_run::{CloudRunJobsProvider, InMemoryCloudRun};
pub use self::cloud_tasks::{CloudTasksProvider, InMemoryCloudTasks};
pub use self::fault::FaultPlan;
pub use self::rest::GcpRestClient;
