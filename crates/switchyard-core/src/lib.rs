//! switchyard-core
//!
//! Routes batch jobs to a cost/capability tier and dispatches them to the
//! backend execution service serving that tier.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（JobConfig, JobResult, JobStatus, AssignedService, errors）
//! - **ports**: 抽象化レイヤー（Provider, TokenSource, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（Router, DispatcherBuilder, Dispatcher）
//! - **impls**: 実装（Cloud Tasks / Cloud Run Jobs / Cloud Batch の Provider、in-memory バックエンド）
//! - **config**: ProviderConfig と REST クライアント設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{Dispatcher, DispatcherBuilder, Router, route};
pub use config::ProviderConfig;
pub use domain::{
    AssignedService, DispatchError, ErrorKind, JobConfig, JobResult, JobStatus, Resources,
    TaskGroup,
};
pub use ports::Provider;
