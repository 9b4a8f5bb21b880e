//! App - アプリケーション層
//!
//! ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder / App**: 構築、起動時検証、ワーカー起動
//! - **TaskDispatcher**: ポーリングジョブの投入口
//! - **PollHandler**: `tasks` キューの状態確認と再投入
//! - **NotifyHandler**: `notifications` キューの完了メール送信
//! - **WorkerGroup**: lease→handle→complete/fail のループ
//! - **StatusSync**: タスク記録のステータス同期

pub mod builder;
pub mod dispatcher;
pub mod notification_worker;
pub mod sync;
pub mod task_worker;
pub mod worker_loop;

#[cfg(test)]
mod scenarios;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError, WorkerPlan};
pub use self::dispatcher::TaskDispatcher;
pub use self::notification_worker::{NotifyHandler, completion_email};
pub use self::sync::StatusSync;
pub use self::task_worker::PollHandler;
pub use self::worker_loop::WorkerGroup;
