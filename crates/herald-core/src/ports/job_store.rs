//! JobStore port: the durable queue behind both worker kinds.
//!
//! Contract:
//! - a job is never delivered before `enqueue time + delay`
//! - each eligible job is handed to exactly one `lease` caller
//! - `complete` and `fail` both remove the job; there is no redelivery and no
//!   dead letter. Retrying means enqueueing a new job.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{JobEnvelope, JobId, QueueName};
use crate::observability::QueueCounts;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("stored job is not valid json: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A job claimed by one worker.
///
/// The envelope is read-only; the worker finishes the lease exactly once.
#[async_trait]
pub trait JobLease: Send {
    fn envelope(&self) -> &JobEnvelope;

    /// The handler returned normally.
    async fn complete(self: Box<Self>) -> Result<(), StoreError>;

    /// The handler failed; the job is dropped.
    async fn fail(self: Box<Self>, reason: String) -> Result<(), StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job that becomes eligible after `delay`.
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<JobId, StoreError>;

    /// Claim the next eligible job, waiting at most `wait` for one.
    async fn lease(
        &self,
        queue: QueueName,
        wait: Duration,
    ) -> Result<Option<Box<dyn JobLease>>, StoreError>;

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, StoreError>;
}
