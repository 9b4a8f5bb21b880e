//! StatusOracle port: the external service that knows whether a task is done.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Observation, OracleSnapshot};

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("network error: {0}")]
    Network(String),

    #[error("oracle returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable oracle response: {0}")]
    Decode(String),
}

impl OracleError {
    /// Network failures, timeouts, throttling and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Network(_) => true,
            OracleError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            OracleError::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait StatusOracle: Send + Sync {
    /// Fetch the status of every job the external service knows about.
    async fn snapshot(&self) -> Result<OracleSnapshot, OracleError>;

    /// Status of one task, found by scanning a fresh snapshot.
    async fn observe(&self, task_id: &str) -> Result<Observation, OracleError> {
        let snapshot = self.snapshot().await?;
        Ok(Observation::from_entry(snapshot.find(task_id)))
    }
}
