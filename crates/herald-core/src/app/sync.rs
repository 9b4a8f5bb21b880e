//! StatusSync: copies oracle status onto locally persisted task records.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{HeraldError, TaskRecord, TaskStatus};
use crate::ports::{StatusOracle, TaskRepository};

pub struct StatusSync {
    oracle: Arc<dyn StatusOracle>,
    repository: Arc<dyn TaskRepository>,
}

impl StatusSync {
    pub fn new(oracle: Arc<dyn StatusOracle>, repository: Arc<dyn TaskRepository>) -> Self {
        Self { oracle, repository }
    }

    /// Refresh `records` from a single oracle snapshot.
    ///
    /// Matched records get the reported status and, when the oracle has one,
    /// its processing duration; each is written back. Unmatched records are
    /// returned untouched. An oracle failure aborts before any write.
    pub async fn refresh(&self, mut records: Vec<TaskRecord>) -> Result<Vec<TaskRecord>, HeraldError> {
        let snapshot = self.oracle.snapshot().await?;
        let mut updated = 0usize;

        for record in records.iter_mut() {
            let Some(entry) = snapshot.find(&record.task_id) else {
                continue;
            };
            record.status = TaskStatus::parse(&entry.normalized_status());
            record.duration = entry.process_duration.unwrap_or(record.duration);
            self.repository
                .update_status(&record.task_id, record.status, record.duration)
                .await?;
            updated += 1;
        }

        debug!(total = records.len(), updated, "task records refreshed");
        Ok(records)
    }

    /// List records (newest first, optionally for one owner) and refresh them.
    pub async fn list_refreshed(&self, owner: Option<u64>) -> Result<Vec<TaskRecord>, HeraldError> {
        let records = self.repository.list(owner).await?;
        self.refresh(records).await
    }
}
