//! TaskRepository port: the narrow slice of relational persistence herald uses.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{TaskRecord, TaskStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("task already exists: {0}")]
    Duplicate(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("repository backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, record: TaskRecord) -> Result<(), RepositoryError>;

    /// Records newest first, restricted to `owner` when given.
    async fn list(&self, owner: Option<u64>) -> Result<Vec<TaskRecord>, RepositoryError>;

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        duration: f64,
    ) -> Result<(), RepositoryError>;
}
