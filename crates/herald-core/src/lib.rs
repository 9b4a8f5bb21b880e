//! herald-core
//!
//! Durable job queue that polls an external processing service until each
//! submitted task completes, then emails its owner.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, jobs, status, outcome, errors）
//! - **ports**: 抽象化レイヤー（JobStore, StatusOracle, Mailer, TaskRepository）
//! - **typed**: 型付き Job API（Task trait, Handler trait, TypedRegistry, PayloadCodec）
//! - **impls**: ports の実装（InMemory / Redis / HTTP）
//! - **app**: アプリケーションロジック（builder, dispatcher, handlers, worker_loop, sync）
//! - **config**: 環境変数からの設定読み込み
//! - **observability**: キューのカウンタ

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;
