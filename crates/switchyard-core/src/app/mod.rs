//! App - アプリケーション層
//!
//! ports を組み合わせてルーティングとディスパッチを実装します。
//!
//! # 主要コンポーネント
//! - **Router**: リソース要求 → AssignedService（tier）
//! - **DispatcherBuilder**: Provider の明示的な登録と起動時検証
//! - **Dispatcher**: tier → Provider への転送

pub mod builder;
pub mod dispatcher;
pub mod router;

// 主要な型を再エクスポート
pub use self::builder::DispatcherBuilder;
pub use self::dispatcher::Dispatcher;
pub use self::router::{Decision, Exceeded, Router, TierLimits, route};
