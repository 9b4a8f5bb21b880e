//! PollHandler: one status check of an external task.
//!
//! After the grace period the oracle is asked for the task's status and the
//! job goes one of three ways:
//! - `completed`: a notification job is enqueued
//! - `running`: a fresh poll job is enqueued with the requeue delay
//! - anything else: polling stops
//!
//! A missing oracle entry follows `UnknownTaskPolicy`. Transient oracle
//! failures may be requeued up to `transient_retry_limit` times; every other
//! error is returned to the harness, which drops the job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{PollPolicy, UnknownTaskPolicy};
use crate::domain::{HeraldError, Observation, Outcome, PollTask, RequeueReason};
use crate::ports::{JobStore, OracleError, StatusOracle};
use crate::typed::{Handler, enqueue_task};

pub struct PollHandler {
    store: Arc<dyn JobStore>,
    oracle: Arc<dyn StatusOracle>,
    policy: PollPolicy,
}

impl PollHandler {
    pub fn new(store: Arc<dyn JobStore>, oracle: Arc<dyn StatusOracle>, policy: PollPolicy) -> Self {
        Self {
            store,
            oracle,
            policy,
        }
    }

    async fn requeue(&self, next: PollTask, reason: RequeueReason) -> Result<Outcome, HeraldError> {
        let delay = self.policy.requeue_delay;
        let job_id = enqueue_task(self.store.as_ref(), &next, delay).await?;
        Ok(Outcome::Requeued {
            task_id: next.task_id,
            job_id,
            delay,
            reason,
        })
    }

    async fn on_oracle_error(&self, job: PollTask, err: OracleError) -> Result<Outcome, HeraldError> {
        if err.is_transient() && job.attempt < self.policy.transient_retry_limit {
            let next = job.next_attempt();
            warn!(
                task_id = %job.task_id,
                attempt = next.attempt,
                limit = self.policy.transient_retry_limit,
                error = %err,
                "status check failed, polling again later"
            );
            let attempt = next.attempt;
            return self
                .requeue(next, RequeueReason::TransientError { attempt })
                .await;
        }
        Err(err.into())
    }
}

#[async_trait]
impl Handler<PollTask> for PollHandler {
    async fn handle(&self, job: PollTask) -> Result<Outcome, HeraldError> {
        if !self.policy.grace_period.is_zero() {
            tokio::time::sleep(self.policy.grace_period).await;
        }

        let observation = match self.oracle.observe(&job.task_id).await {
            Ok(observation) => observation,
            Err(err) => return self.on_oracle_error(job, err).await,
        };
        debug!(task_id = %job.task_id, status = observation.as_str(), "status observed");

        match observation.as_str() {
            "completed" => {
                let note = job.notification();
                let job_id = enqueue_task(self.store.as_ref(), &note, Duration::ZERO).await?;
                info!(task_id = %job.task_id, %job_id, "task completed, notification queued");
                Ok(Outcome::NotificationQueued {
                    task_id: job.task_id,
                    job_id,
                })
            }
            "running" => {
                debug!(task_id = %job.task_id, "task still running");
                self.requeue(job.reset_attempts(), RequeueReason::StillRunning).await
            }
            _ if observation == Observation::Missing
                && self.policy.unknown_task_policy == UnknownTaskPolicy::RetryOnUnknown =>
            {
                debug!(task_id = %job.task_id, "task unknown to oracle, polling again later");
                self.requeue(job.reset_attempts(), RequeueReason::UnknownTask).await
            }
            status => {
                info!(task_id = %job.task_id, status, "polling stopped");
                Ok(Outcome::Abandoned {
                    task_id: job.task_id,
                    status: status.to_string(),
                })
            }
        }
    }
}
