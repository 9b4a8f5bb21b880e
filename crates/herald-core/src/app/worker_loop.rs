//! WorkerLoop - ジョブ実行ループ
//!
//! # フロー
//! 1. JobStore::lease() で次のジョブを取得（最大 lease_wait 待つ）
//! 2. DynHandler を別タスクで実行（panic してもワーカーは死なない）
//! 3. Outcome / エラーをログに残す
//! 4. complete() または fail() でジョブを削除（再配送はしない）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, error, info, info_span, warn};

use crate::domain::{HeraldError, QueueName};
use crate::ports::{JobLease, JobStore};
use crate::typed::DynHandler;

/// Minimum pause after a failed lease.
const MIN_LEASE_RETRY: Duration = Duration::from_millis(100);

/// Worker group handle.
/// - `request_shutdown()` で新しい lease の取得を止める
/// - 実行中の handler はキャンセルしない
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    next_worker_id: usize,
}

impl WorkerGroup {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            joins: Vec::new(),
            next_worker_id: 0,
        }
    }

    /// Spawn `n` workers for the handler's queue.
    pub fn spawn(
        &mut self,
        n: usize,
        store: Arc<dyn JobStore>,
        handler: Arc<dyn DynHandler>,
        lease_wait: Duration,
    ) {
        for _ in 0..n {
            let worker_id = self.next_worker_id;
            self.next_worker_id += 1;

            let store = Arc::clone(&store);
            let handler = Arc::clone(&handler);
            let shutdown_rx = self.shutdown_tx.subscribe();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, store, handler, lease_wait, shutdown_rx).await;
            });
            self.joins.push(join);
        }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Request shutdown for all workers.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                error!(error = %err, "worker task ended abnormally");
            }
        }
    }
}

impl Default for WorkerGroup {
    fn default() -> Self {
        Self::new()
    }
}

async fn worker_loop(
    worker_id: usize,
    store: Arc<dyn JobStore>,
    handler: Arc<dyn DynHandler>,
    lease_wait: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let queue = handler.queue();
    info!(worker_id, %queue, "worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は途中でキャンセルしない（取得済みジョブが宙に浮く）
        let lease = match store.lease(queue, lease_wait).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                tokio::task::yield_now().await;
                continue;
            }
            Err(err) => {
                warn!(worker_id, %queue, error = %err, "lease failed");
                tokio::select! {
                    _ = tokio::time::sleep(lease_wait.max(MIN_LEASE_RETRY)) => {}
                    _ = shutdown_rx.changed() => {}
                }
                continue;
            }
        };

        run_job(worker_id, queue, Arc::clone(&handler), lease).await;
    }

    info!(worker_id, %queue, "worker stopped");
}

async fn run_job(
    worker_id: usize,
    queue: QueueName,
    handler: Arc<dyn DynHandler>,
    lease: Box<dyn JobLease>,
) {
    let job_id = lease.envelope().job_id();
    let span = info_span!("job", %queue, %job_id, worker_id);

    async move {
        let payload = lease.envelope().payload().clone();
        let execution = tokio::spawn(
            async move { handler.handle_dyn(payload).await }.in_current_span(),
        );
        let result = match execution.await {
            Ok(result) => result,
            Err(err) => Err(HeraldError::HandlerPanicked(panic_message(err))),
        };

        match result {
            Ok(outcome) => {
                info!(outcome = outcome.label(), task_id = outcome.task_id(), "job handled");
                if let Err(err) = lease.complete().await {
                    error!(error = %err, "failed to complete job");
                }
            }
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), "job failed and was dropped");
                if let Err(store_err) = lease.fail(err.to_string()).await {
                    error!(error = %store_err, "failed to record job failure");
                }
            }
        }
    }
    .instrument(span)
    .await
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
