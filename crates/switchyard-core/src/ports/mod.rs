//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（Cloud Tasks, Cloud Run, Cloud Batch, OAuth など）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - バックエンドが source of truth（正本）。ジョブ状態はキャッシュしない
//! - Provider ごとに 1 つのバックエンドクライアントを所有する

pub mod provider;
pub mod clock;
pub mod id_generator;
pub mod token_source;

// 主要な trait を再エクスポート
pub use self::provider::Provider;
pub use self::clock::{Clock, SystemClock, FixedClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::token_source::TokenSource;
