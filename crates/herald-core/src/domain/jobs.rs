//! Typed job payloads for the two queues.

use serde::{Deserialize, Serialize};

use super::{QueueName, UserDescriptor};
use crate::typed::Task;

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// One status check of an external task, on the `tasks` queue.
///
/// `attempt` counts consecutive transient oracle failures. It is left out of
/// the wire form when zero so that a "still running" requeue is byte-for-byte
/// the payload that was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTask {
    pub user: UserDescriptor,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempt: u32,
}

impl PollTask {
    pub fn new(user: UserDescriptor, task_id: impl Into<String>) -> Self {
        Self {
            user,
            task_id: task_id.into(),
            attempt: 0,
        }
    }

    /// Same task, next transient-failure attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Same task with the failure counter cleared.
    pub fn reset_attempts(&self) -> Self {
        Self {
            attempt: 0,
            ..self.clone()
        }
    }

    pub fn notification(&self) -> NotifyTask {
        NotifyTask {
            user: self.user.clone(),
            task_id: self.task_id.clone(),
        }
    }
}

impl Task for PollTask {
    const QUEUE: QueueName = QueueName::Tasks;
}

/// Completion email for one task, on the `notifications` queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTask {
    pub user: UserDescriptor,
    pub task_id: String,
}

impl Task for NotifyTask {
    const QUEUE: QueueName = QueueName::Notifications;
}
