use serde::{Deserialize, Serialize};
use std::fmt;

/// The two logical queues served by herald.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    /// Poll jobs: one per status check of an external task.
    Tasks,
    /// Follow-up jobs that send the completion email.
    Notifications,
}

impl QueueName {
    pub const ALL: [QueueName; 2] = [QueueName::Tasks, QueueName::Notifications];

    pub const fn as_str(self) -> &'static str {
        match self {
            QueueName::Tasks => "tasks",
            QueueName::Notifications => "notifications",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
