//! Errors and their operational classification.

use thiserror::Error;

use super::QueueName;
use crate::ports::{MailError, OracleError, RepositoryError, StoreError};

/// Operational class of an error.
///
/// - Transient: may succeed if tried again later.
/// - Permanent: trying again cannot help.
/// - Infrastructure: the store or another backing service is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("job store: {0}")]
    Store(#[from] StoreError),

    #[error("status oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("notification delivery: {0}")]
    Notification(#[from] MailError),

    #[error("task repository: {0}")]
    Repository(#[from] RepositoryError),

    #[error("payload decode for queue={queue}: {message}")]
    Decode { queue: QueueName, message: String },

    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("no handler registered for queue={0}")]
    HandlerNotFound(QueueName),

    #[error("configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HeraldError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeraldError::Store(_) => ErrorKind::Infrastructure,
            HeraldError::Repository(_) => ErrorKind::Infrastructure,
            HeraldError::Oracle(err) if err.is_transient() => ErrorKind::Transient,
            HeraldError::Oracle(_) => ErrorKind::Permanent,
            HeraldError::Notification(_) => ErrorKind::Transient,
            HeraldError::Decode { .. }
            | HeraldError::HandlerPanicked(_)
            | HeraldError::HandlerNotFound(_)
            | HeraldError::Config(_)
            | HeraldError::InvalidConfig(_) => ErrorKind::Permanent,
        }
    }
}
