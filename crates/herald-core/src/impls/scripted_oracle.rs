//! Deterministic oracle for tests and local runs.
//!
//! Responses are served in order; once the script runs out the last one is
//! repeated. An empty script answers with an empty snapshot.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::{ExternalTask, OracleSnapshot};
use crate::ports::{OracleError, StatusOracle};

type Response = Result<OracleSnapshot, OracleError>;

#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Response>>,
    last: Mutex<Option<Response>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: append a snapshot made of `tasks`.
    pub fn then_tasks(self, tasks: Vec<ExternalTask>) -> Self {
        self.push(Ok(OracleSnapshot { tasks }));
        self
    }

    /// Builder-style: append a failure.
    pub fn then_error(self, err: OracleError) -> Self {
        self.push(Err(err));
        self
    }

    pub fn push(&self, response: Response) {
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(response);
    }

    /// Number of snapshots requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusOracle for ScriptedOracle {
    async fn snapshot(&self) -> Result<OracleSnapshot, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(response) = next {
            *last = Some(response);
        }
        last.clone().unwrap_or_else(|| Ok(OracleSnapshot::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    #[tokio::test]
    async fn serves_in_order_then_repeats_last() {
        let oracle = ScriptedOracle::new()
            .then_tasks(vec![ExternalTask::new("T1", "running")])
            .then_tasks(vec![ExternalTask::new("T1", "completed")]);

        assert_eq!(
            oracle.observe("T1").await.unwrap(),
            Observation::Reported("running".into())
        );
        assert_eq!(
            oracle.observe("T1").await.unwrap(),
            Observation::Reported("completed".into())
        );
        assert_eq!(
            oracle.observe("T1").await.unwrap(),
            Observation::Reported("completed".into())
        );
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn empty_script_is_empty_snapshot() {
        let oracle = ScriptedOracle::new();
        assert_eq!(oracle.observe("T1").await.unwrap(), Observation::Missing);
    }

    #[tokio::test]
    async fn scripted_error_is_returned() {
        let oracle = ScriptedOracle::new().then_error(OracleError::Network("refused".into()));
        assert!(matches!(oracle.snapshot().await, Err(OracleError::Network(_))));
    }
}
