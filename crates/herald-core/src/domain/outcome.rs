//! Outcome: what a handler did with one job.
//!
//! Handlers return `Result<Outcome, HeraldError>`. The harness logs the
//! outcome and removes the job either way; nothing is retried implicitly.

use std::time::Duration;

use super::JobId;

/// Why a poll put a new `tasks` job back into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueReason {
    /// The oracle still reports `running`.
    StillRunning,
    /// The oracle has no entry and the policy is `retry-on-unknown`.
    UnknownTask,
    /// The oracle call failed transiently; `attempt` is the new job's counter.
    TransientError { attempt: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The task completed and its notification job was enqueued.
    NotificationQueued { task_id: String, job_id: JobId },

    /// A fresh poll job was enqueued with `delay`.
    Requeued {
        task_id: String,
        job_id: JobId,
        delay: Duration,
        reason: RequeueReason,
    },

    /// Neither completed nor running: polling stops here.
    Abandoned { task_id: String, status: String },

    /// The completion email was handed to the mailer.
    EmailSent { task_id: String, recipient: String },
}

impl Outcome {
    /// Short stable label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::NotificationQueued { .. } => "notification_queued",
            Outcome::Requeued { .. } => "requeued",
            Outcome::Abandoned { .. } => "abandoned",
            Outcome::EmailSent { .. } => "email_sent",
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Outcome::NotificationQueued { task_id, .. }
            | Outcome::Requeued { task_id, .. }
            | Outcome::Abandoned { task_id, .. }
            | Outcome::EmailSent { task_id, .. } => task_id,
        }
    }
}
