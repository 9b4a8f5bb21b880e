//! End-to-end runs: dispatcher, both worker kinds, in-memory store, scripted
//! oracle and captured mail, on paused time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::{App, WorkerGroup, WorkerPlan};
use crate::config::Settings;
use crate::domain::{ExternalTask, QueueName, UserDescriptor};
use crate::impls::{InMemoryJobStore, MemoryMailer, ScriptedOracle};
use crate::observability::QueueCounts;
use crate::ports::{JobStore, OracleError};

struct Harness {
    store: Arc<InMemoryJobStore>,
    oracle: Arc<ScriptedOracle>,
    mailer: Arc<MemoryMailer>,
    app: App,
}

impl Harness {
    fn new(oracle: ScriptedOracle, extra: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("TASK_API_ENDPOINT".to_string(), "http://oracle.test".to_string()),
            ("LEASE_WAIT_MS".to_string(), "1000".to_string()),
        ]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let settings = Settings::from_map(vars).unwrap();

        let store = Arc::new(InMemoryJobStore::new());
        let oracle = Arc::new(oracle);
        let mailer = Arc::new(MemoryMailer::new());
        let app = App::standard(&settings, store.clone(), oracle.clone(), mailer.clone()).unwrap();
        Self {
            store,
            oracle,
            mailer,
            app,
        }
    }

    fn start(&self) -> WorkerGroup {
        let plan = WorkerPlan::new(Duration::from_secs(1))
            .with(QueueName::Tasks, 1)
            .with(QueueName::Notifications, 1);
        self.app.start(&plan).unwrap()
    }

    async fn counts(&self, queue: QueueName) -> QueueCounts {
        self.store.counts(queue).await.unwrap()
    }

    /// Advance virtual time until `done` holds, failing after `limit`.
    async fn run_until(&self, limit: Duration, done: impl Fn(&Self) -> bool) {
        let deadline = Instant::now() + limit;
        while !done(self) {
            assert!(Instant::now() < deadline, "scenario did not settle within {limit:?}");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn ana() -> UserDescriptor {
    UserDescriptor::new(7, "Ana", "a@x.com")
}

#[tokio::test(start_paused = true)]
async fn running_then_completed_sends_one_email() {
    let oracle = ScriptedOracle::new()
        .then_tasks(vec![ExternalTask::new("T1", "running")])
        .then_tasks(vec![ExternalTask::new("T1", "completed")]);
    let harness = Harness::new(oracle, &[]);
    let group = harness.start();

    harness.app.dispatcher().submit(ana(), "T1").await.unwrap();
    harness
        .run_until(Duration::from_secs(30 * 60), |h| h.mailer.attempts() == 1)
        .await;

    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@x.com");
    assert!(sent[0].subject.contains("T1"));
    assert_eq!(harness.oracle.calls(), 2);

    // initial poll plus exactly one requeue
    let tasks = harness.counts(QueueName::Tasks).await;
    assert_eq!((tasks.completed, tasks.failed, tasks.pending()), (2, 0, 0));
    let notes = harness.counts(QueueName::Notifications).await;
    assert_eq!((notes.completed, notes.failed, notes.pending()), (1, 0, 0));

    group.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn requeue_interval_is_fixed() {
    let oracle = ScriptedOracle::new()
        .then_tasks(vec![ExternalTask::new("T1", "running")])
        .then_tasks(vec![ExternalTask::new("T1", "running")])
        .then_tasks(vec![ExternalTask::new("T1", "completed")]);
    let harness = Harness::new(oracle, &[("REQUEUE_DELAY_MINUTES", "5")]);
    let group = harness.start();

    let started = Instant::now();
    harness.app.dispatcher().submit(ana(), "T1").await.unwrap();
    harness
        .run_until(Duration::from_secs(60 * 60), |h| h.mailer.attempts() == 1)
        .await;

    // three grace periods and two fixed 5 minute requeues
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(615), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(617), "{elapsed:?}");
    assert_eq!(harness.oracle.calls(), 3);

    group.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_task_is_dropped() {
    let oracle = ScriptedOracle::new().then_tasks(vec![ExternalTask::new("T1", "running")]);
    let harness = Harness::new(oracle, &[]);
    let group = harness.start();

    harness.app.dispatcher().submit(ana(), "T2").await.unwrap();
    harness
        .run_until(Duration::from_secs(60), |h| h.oracle.calls() == 1)
        .await;
    tokio::time::sleep(Duration::from_secs(20 * 60)).await;

    let tasks = harness.counts(QueueName::Tasks).await;
    assert_eq!((tasks.completed, tasks.pending()), (1, 0));
    assert_eq!(harness.counts(QueueName::Notifications).await, QueueCounts::default());
    assert_eq!(harness.mailer.attempts(), 0);
    assert_eq!(harness.oracle.calls(), 1);

    group.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_task_polled_again_under_retry_policy() {
    let oracle = ScriptedOracle::new()
        .then_tasks(vec![])
        .then_tasks(vec![ExternalTask::new("T2", "completed")]);
    let harness = Harness::new(oracle, &[("UNKNOWN_TASK_POLICY", "retry-on-unknown")]);
    let group = harness.start();

    harness.app.dispatcher().submit(ana(), "T2").await.unwrap();
    harness
        .run_until(Duration::from_secs(30 * 60), |h| h.mailer.attempts() == 1)
        .await;
    assert_eq!(harness.oracle.calls(), 2);

    group.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn network_error_terminates_job() {
    let oracle = ScriptedOracle::new().then_error(OracleError::Network("connection refused".into()));
    let harness = Harness::new(oracle, &[]);
    let group = harness.start();

    harness.app.dispatcher().submit(ana(), "T1").await.unwrap();
    harness
        .run_until(Duration::from_secs(60), |h| h.oracle.calls() == 1)
        .await;
    tokio::time::sleep(Duration::from_secs(20 * 60)).await;

    let tasks = harness.counts(QueueName::Tasks).await;
    assert_eq!((tasks.completed, tasks.failed, tasks.pending()), (0, 1, 0));
    assert_eq!(harness.counts(QueueName::Notifications).await, QueueCounts::default());
    assert_eq!(harness.mailer.attempts(), 0);

    group.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn failed_email_is_not_retried() {
    let oracle = ScriptedOracle::new().then_tasks(vec![ExternalTask::new("T1", "completed")]);
    let harness = Harness::new(oracle, &[]);
    harness.mailer.set_failing(true);
    let group = harness.start();

    harness.app.dispatcher().submit(ana(), "T1").await.unwrap();
    harness
        .run_until(Duration::from_secs(60), |h| h.mailer.attempts() == 1)
        .await;
    tokio::time::sleep(Duration::from_secs(20 * 60)).await;

    assert_eq!(harness.mailer.attempts(), 1);
    let notes = harness.counts(QueueName::Notifications).await;
    assert_eq!((notes.completed, notes.failed, notes.pending()), (0, 1, 0));

    group.shutdown_and_join().await;
}
