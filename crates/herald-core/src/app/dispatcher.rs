//! TaskDispatcher - 外部タスクのポーリング開始
//!
//! 外部サービスにタスクを投入した直後に呼ばれ、`tasks` キューへ
//! 最初のポーリングジョブを積む。

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::domain::{HeraldError, JobId, PollTask, UserDescriptor};
use crate::ports::JobStore;
use crate::typed::enqueue_task;

#[derive(Clone)]
pub struct TaskDispatcher {
    store: Arc<dyn JobStore>,
}

impl TaskDispatcher {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Start polling `task_id` on behalf of `user`.
    ///
    /// `task_id` is not validated; an id the oracle never reports is simply
    /// abandoned on the first check. Store failures are returned as-is.
    pub async fn submit(
        &self,
        user: UserDescriptor,
        task_id: impl Into<String>,
    ) -> Result<JobId, HeraldError> {
        let job = PollTask::new(user, task_id);
        let job_id = enqueue_task(self.store.as_ref(), &job, Duration::ZERO).await?;
        info!(
            task_id = %job.task_id,
            user_id = job.user.user_id,
            %job_id,
            "task submitted for polling"
        );
        Ok(job_id)
    }
}
