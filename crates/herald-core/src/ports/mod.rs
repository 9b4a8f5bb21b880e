//! Ports: the traits herald's logic is written against.
//!
//! - JobStore: the queue (in-memory or Redis)
//! - StatusOracle: the external processing service
//! - Mailer: outbound email
//! - TaskRepository: persisted task records

pub mod job_store;
pub mod mailer;
pub mod status_oracle;
pub mod task_repository;

pub use self::job_store::{JobLease, JobStore, StoreError};
pub use self::mailer::{EmailMessage, MailError, Mailer};
pub use self::status_oracle::{OracleError, StatusOracle};
pub use self::task_repository::{RepositoryError, TaskRepository};
