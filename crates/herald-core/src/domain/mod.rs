//! Domain model: ids, queues, job payloads, statuses, outcomes, errors.

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod jobs;
pub mod outcome;
pub mod queue_name;
pub mod status;
pub mod user;

pub use envelope::JobEnvelope;
pub use errors::{ErrorKind, HeraldError};
pub use ids::JobId;
pub use jobs::{NotifyTask, PollTask};
pub use outcome::{Outcome, RequeueReason};
pub use queue_name::QueueName;
pub use status::{ExternalTask, Observation, OracleSnapshot, TaskRecord, TaskStatus};
pub use user::UserDescriptor;
