//! External task status as reported by the oracle and as persisted locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an external processing task.
///
/// Oracle strings are compared case-insensitively; anything outside the known
/// set is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Unknown,
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }

    /// Only `completed` ends polling.
    pub const fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the oracle's job list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTask {
    pub task_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_duration: Option<f64>,
}

impl ExternalTask {
    pub fn new(task_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: Some(status.into()),
            process_duration: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.process_duration = Some(seconds);
        self
    }

    /// Lower-cased status, `""` when the oracle sent none.
    pub fn normalized_status(&self) -> String {
        self.status.as_deref().unwrap_or_default().to_lowercase()
    }
}

/// Body of the oracle's status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleSnapshot {
    #[serde(default)]
    pub tasks: Vec<ExternalTask>,
}

impl OracleSnapshot {
    pub fn find(&self, task_id: &str) -> Option<&ExternalTask> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }
}

/// What the poll handler learned about one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The oracle has no entry for the task id.
    Missing,
    /// The oracle's status string, lower-cased.
    Reported(String),
}

impl Observation {
    pub fn from_entry(entry: Option<&ExternalTask>) -> Self {
        match entry {
            Some(task) => Observation::Reported(task.normalized_status()),
            None => Observation::Missing,
        }
    }

    /// The status string as the decision sees it (`""` when missing).
    pub fn as_str(&self) -> &str {
        match self {
            Observation::Missing => "",
            Observation::Reported(s) => s,
        }
    }
}

/// Locally persisted view of an external task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub user_id: u64,
    pub file_name: String,
    pub category: String,
    pub status: TaskStatus,
    /// Processing time in seconds, as last reported by the oracle.
    pub duration: f64,
    pub creation_time: DateTime<Utc>,
}

impl TaskRecord {
    /// A freshly submitted task: `pending`, zero duration.
    pub fn pending(
        task_id: impl Into<String>,
        user_id: u64,
        file_name: impl Into<String>,
        category: impl Into<String>,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            user_id,
            file_name: file_name.into(),
            category: category.into(),
            status: TaskStatus::Pending,
            duration: 0.0,
            creation_time,
        }
    }
}
