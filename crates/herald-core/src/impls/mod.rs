//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryJobStore**: 開発・テスト用のジョブストア
//! - **RedisJobStore**: 本番用の永続ジョブストア
//! - **HttpStatusOracle**: 外部ステータス API クライアント
//! - **ScriptedOracle**: テスト用の決定的オラクル
//! - **SmtpMailer**: 本番用の SMTP 送信
//! - **LogMailer / MemoryMailer**: SMTP 未設定時のログ出力・テスト用のメモリ保持
//! - **InMemoryTaskRepository**: テスト用のタスク記録

pub mod http_oracle;
pub mod inmem_store;
pub mod inmem_tasks;
pub mod log_mailer;
pub mod memory_mailer;
pub mod redis_store;
pub mod scripted_oracle;
pub mod smtp_mailer;

// 主要な型を再エクスポート
pub use self::http_oracle::HttpStatusOracle;
pub use self::inmem_store::InMemoryJobStore;
pub use self::inmem_tasks::InMemoryTaskRepository;
pub use self::log_mailer::LogMailer;
pub use self::memory_mailer::MemoryMailer;
pub use self::redis_store::RedisJobStore;
pub use self::scripted_oracle::ScriptedOracle;
pub use self::smtp_mailer::SmtpMailer;
