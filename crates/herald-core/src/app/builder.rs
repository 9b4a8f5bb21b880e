//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! - Builder パターンで handler を登録
//! - 起動時検証（Fail-fast 設計）
//! - 標準構成（PollHandler + NotifyHandler）のワイヤリング

use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::TaskDispatcher;
use super::notification_worker::NotifyHandler;
use super::task_worker::PollHandler;
use super::worker_loop::WorkerGroup;
use crate::config::Settings;
use crate::domain::{HeraldError, NotifyTask, PollTask, QueueName};
use crate::ports::{JobStore, Mailer, StatusOracle};
use crate::typed::{Handler, RegistryError, Task, TypedRegistry};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(store)
///     .register::<PollTask, _>(poll_handler)?
///     .register::<NotifyTask, _>(notify_handler)?
///     .expect_queues(&QueueName::ALL)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_queues() で処理すべきキューを宣言
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct AppBuilder {
    store: Arc<dyn JobStore>,
    registry: TypedRegistry,
    expected_queues: Option<Vec<QueueName>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing handlers for queues: {0:?}. These queues were expected but not registered.")]
    MissingQueues(Vec<QueueName>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Settings(#[from] HeraldError),
}

impl AppBuilder {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            registry: TypedRegistry::new(),
            expected_queues: None,
        }
    }

    /// Handler を登録（同じキューへの二重登録はエラー）
    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    /// 処理されなければならないキューを設定
    pub fn expect_queues(mut self, queues: &[QueueName]) -> Self {
        self.expected_queues = Some(queues.to_vec());
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected_queues {
            let registered = self.registry.registered_queues();
            let missing: Vec<QueueName> = expected
                .iter()
                .filter(|q| !registered.contains(q))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingQueues(missing));
            }
        }
        Ok(App {
            store: self.store,
            registry: Arc::new(self.registry),
        })
    }
}

/// How many workers each queue gets, and how long each lease call may wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPlan {
    workers: Vec<(QueueName, usize)>,
    lease_wait: Duration,
}

impl WorkerPlan {
    pub fn new(lease_wait: Duration) -> Self {
        Self {
            workers: Vec::new(),
            lease_wait,
        }
    }

    pub fn with(mut self, queue: QueueName, count: usize) -> Self {
        self.workers.push((queue, count));
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.lease_wait())
            .with(QueueName::Tasks, settings.task_workers)
            .with(QueueName::Notifications, settings.notification_workers)
    }
}

/// App はアプリケーションのランタイム
///
/// - JobStore と検証済みの TypedRegistry を保持
/// - dispatcher() で投入口を、start() でワーカーを提供
pub struct App {
    store: Arc<dyn JobStore>,
    registry: Arc<TypedRegistry>,
}

impl App {
    /// Wire the poll and notification handlers from `settings`.
    pub fn standard(
        settings: &Settings,
        store: Arc<dyn JobStore>,
        oracle: Arc<dyn StatusOracle>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, BuildError> {
        let poll = PollHandler::new(Arc::clone(&store), oracle, settings.poll_policy()?);
        let notify = NotifyHandler::new(mailer, settings.mail_from.clone());
        AppBuilder::new(store)
            .register::<PollTask, _>(poll)?
            .register::<NotifyTask, _>(notify)?
            .expect_queues(&QueueName::ALL)
            .build()
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    pub fn registry(&self) -> &TypedRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> TaskDispatcher {
        TaskDispatcher::new(self.store())
    }

    /// Spawn the planned workers. Fails if a planned queue has no handler.
    pub fn start(&self, plan: &WorkerPlan) -> Result<WorkerGroup, HeraldError> {
        let mut group = WorkerGroup::new();
        for &(queue, count) in &plan.workers {
            let handler = self
                .registry
                .get(queue)
                .ok_or(HeraldError::HandlerNotFound(queue))?;
            group.spawn(count, self.store(), handler, plan.lease_wait);
        }
        Ok(group)
    }
}
