//! In-memory TaskRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{TaskRecord, TaskStatus};
use crate::ports::{RepositoryError, TaskRepository};

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    records: RwLock<HashMap<String, TaskRecord>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.records.read().await.get(task_id).cloned()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, record: TaskRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.task_id) {
            return Err(RepositoryError::Duplicate(record.task_id));
        }
        records.insert(record.task_id.clone(), record);
        Ok(())
    }

    async fn list(&self, owner: Option<u64>) -> Result<Vec<TaskRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut out: Vec<TaskRecord> = records
            .values()
            .filter(|r| owner.is_none_or(|id| r.user_id == id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.creation_time
                .cmp(&a.creation_time)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(out)
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        duration: f64,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(task_id)
            .ok_or_else(|| RepositoryError::NotFound(task_id.to_string()))?;
        record.status = status;
        record.duration = duration;
        Ok(())
    }
}
