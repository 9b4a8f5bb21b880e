//! In-memory job store.
//!
//! Per queue:
//! - `ready`: FIFO of eligible jobs
//! - `scheduled`: min-heap of delayed jobs keyed by eligibility time
//! - `in_flight`: leased jobs, removed on complete/fail
//!
//! Waiting `lease` callers park on a per-queue `Notify` and wake on enqueue or
//! when the earliest scheduled job falls due. The state lock is never held
//! across an await.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{JobEnvelope, JobId, QueueName};
use crate::observability::QueueCounts;
use crate::ports::{JobLease, JobStore, StoreError};

/// Heap entry. `seq` keeps jobs with the same eligibility time in
/// enqueue order.
#[derive(Debug)]
struct ScheduledJob {
    eligible_at: Instant,
    seq: u64,
    envelope: JobEnvelope,
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.eligible_at == other.eligible_at && self.seq == other.seq
    }
}

impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so BinaryHeap pops the earliest job first.
        other
            .eligible_at
            .cmp(&self.eligible_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<JobEnvelope>,
    scheduled: BinaryHeap<ScheduledJob>,
    in_flight: HashMap<JobId, JobEnvelope>,
    completed: u64,
    failed: u64,
}

impl QueueState {
    /// Move every due scheduled job to the back of `ready`.
    fn promote_due(&mut self, now: Instant) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.eligible_at > now {
                break;
            }
            if let Some(entry) = self.scheduled.pop() {
                self.ready.push_back(entry.envelope);
            }
        }
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            ready: self.ready.len(),
            scheduled: self.scheduled.len(),
            in_flight: self.in_flight.len(),
            completed: self.completed,
            failed: self.failed,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    queues: HashMap<QueueName, QueueState>,
    next_seq: u64,
}

impl StoreState {
    fn queue_mut(&mut self, queue: QueueName) -> &mut QueueState {
        self.queues.entry(queue).or_default()
    }
}

/// Process-local [`JobStore`]. Jobs do not survive a restart.
pub struct InMemoryJobStore {
    state: Arc<Mutex<StoreState>>,
    notifiers: HashMap<QueueName, Arc<Notify>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        let notifiers = QueueName::ALL
            .into_iter()
            .map(|q| (q, Arc::new(Notify::new())))
            .collect();
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            notifiers,
        }
    }

    fn notifier(&self, queue: QueueName) -> Arc<Notify> {
        // Every QueueName is inserted in `new`.
        Arc::clone(&self.notifiers[&queue])
    }

    /// Jobs still waiting in `queue`: ready ones first, then scheduled ones by
    /// eligibility.
    pub async fn pending(&self, queue: QueueName) -> Vec<JobEnvelope> {
        let mut state = self.state.lock().await;
        let q = state.queue_mut(queue);
        let mut scheduled: Vec<&ScheduledJob> = q.scheduled.iter().collect();
        scheduled.sort_by(|a, b| b.cmp(a));
        q.ready
            .iter()
            .cloned()
            .chain(scheduled.into_iter().map(|s| s.envelope.clone()))
            .collect()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<JobId, StoreError> {
        let envelope = JobEnvelope::new(queue, payload, delay);
        let job_id = envelope.job_id();
        {
            let mut state = self.state.lock().await;
            let seq = state.next_seq;
            state.next_seq += 1;
            let q = state.queue_mut(queue);
            if delay.is_zero() {
                q.ready.push_back(envelope);
            } else {
                q.scheduled.push(ScheduledJob {
                    eligible_at: Instant::now() + delay,
                    seq,
                    envelope,
                });
            }
        }
        debug!(%queue, %job_id, delay_ms = delay.as_millis() as u64, "job enqueued");

        // A parked worker either takes the job or re-arms its timer for it.
        self.notifier(queue).notify_one();
        Ok(job_id)
    }

    async fn lease(
        &self,
        queue: QueueName,
        wait: Duration,
    ) -> Result<Option<Box<dyn JobLease>>, StoreError> {
        let deadline = Instant::now() + wait;
        let notify = self.notifier(queue);
        loop {
            let next_due = {
                let mut state = self.state.lock().await;
                let q = state.queue_mut(queue);
                q.promote_due(Instant::now());

                if let Some(envelope) = q.ready.pop_front() {
                    q.in_flight.insert(envelope.job_id(), envelope.clone());
                    return Ok(Some(Box::new(InMemoryLease {
                        envelope,
                        state: Arc::clone(&self.state),
                    })));
                }
                q.scheduled.peek().map(|entry| entry.eligible_at)
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }
            let wake_at = next_due.map_or(deadline, |due| due.min(deadline));
            tokio::select! {
                _ = notify.notified() => {},
                _ = tokio::time::sleep_until(wake_at) => {},
            }
        }
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.queue_mut(queue).counts())
    }
}

struct InMemoryLease {
    envelope: JobEnvelope,
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryLease {
    async fn finish(self, succeeded: bool) {
        let mut state = self.state.lock().await;
        let q = state.queue_mut(self.envelope.queue());
        q.in_flight.remove(&self.envelope.job_id());
        if succeeded {
            q.completed += 1;
        } else {
            q.failed += 1;
        }
    }
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn envelope(&self) -> &JobEnvelope {
        &self.envelope
    }

    async fn complete(self: Box<Self>) -> Result<(), StoreError> {
        (*self).finish(true).await;
        Ok(())
    }

    async fn fail(self: Box<Self>, reason: String) -> Result<(), StoreError> {
        debug!(
            queue = %self.envelope.queue(),
            job_id = %self.envelope.job_id(),
            %reason,
            "job dropped after failure"
        );
        (*self).finish(false).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NO_WAIT: Duration = Duration::ZERO;

    #[tokio::test]
    async fn enqueue_then_lease_fifo() {
        let store = InMemoryJobStore::new();
        let first = store.enqueue(QueueName::Tasks, json!({"n": 1}), Duration::ZERO).await.unwrap();
        let second = store.enqueue(QueueName::Tasks, json!({"n": 2}), Duration::ZERO).await.unwrap();

        let counts = store.counts(QueueName::Tasks).await.unwrap();
        assert_eq!(counts.ready, 2);

        let a = store.lease(QueueName::Tasks, NO_WAIT).await.unwrap().unwrap();
        let b = store.lease(QueueName::Tasks, NO_WAIT).await.unwrap().unwrap();
        assert_eq!(a.envelope().job_id(), first);
        assert_eq!(b.envelope().job_id(), second);
        assert!(store.lease(QueueName::Tasks, NO_WAIT).await.unwrap().is_none());

        let counts = store.counts(QueueName::Tasks).await.unwrap();
        assert_eq!(counts.in_flight, 2);
        assert_eq!(counts.ready, 0);
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let store = InMemoryJobStore::new();
        store.enqueue(QueueName::Notifications, json!({}), Duration::ZERO).await.unwrap();

        assert!(store.lease(QueueName::Tasks, NO_WAIT).await.unwrap().is_none());
        assert!(store.lease(QueueName::Notifications, NO_WAIT).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn complete_and_fail_both_remove_the_job() {
        let store = InMemoryJobStore::new();
        store.enqueue(QueueName::Tasks, json!({"ok": true}), Duration::ZERO).await.unwrap();
        store.enqueue(QueueName::Tasks, json!({"ok": false}), Duration::ZERO).await.unwrap();

        let ok = store.lease(QueueName::Tasks, NO_WAIT).await.unwrap().unwrap();
        ok.complete().await.unwrap();
        let bad = store.lease(QueueName::Tasks, NO_WAIT).await.unwrap().unwrap();
        bad.fail("boom".into()).await.unwrap();

        let counts = store.counts(QueueName::Tasks).await.unwrap();
        assert_eq!(counts, QueueCounts { completed: 1, failed: 1, ..QueueCounts::default() });
        assert!(store.pending(QueueName::Tasks).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_job_is_not_leased_early() {
        let store = InMemoryJobStore::new();
        store
            .enqueue(QueueName::Tasks, json!({}), Duration::from_secs(60))
            .await
            .unwrap();

        let counts = store.counts(QueueName::Tasks).await.unwrap();
        assert_eq!((counts.ready, counts.scheduled), (0, 1));

        let early = store.lease(QueueName::Tasks, Duration::from_secs(59)).await.unwrap();
        assert!(early.is_none());

        let started = Instant::now();
        let lease = store.lease(QueueName::Tasks, Duration::from_secs(10)).await.unwrap();
        assert!(lease.is_some());
        // 59s already waited above; the job became due one second later.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1) && waited < Duration::from_millis(1010), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_delay_is_delivered_first() {
        let store = InMemoryJobStore::new();
        store.enqueue(QueueName::Tasks, json!({"n": "late"}), Duration::from_secs(120)).await.unwrap();
        store.enqueue(QueueName::Tasks, json!({"n": "soon"}), Duration::from_secs(30)).await.unwrap();

        let pending = store.pending(QueueName::Tasks).await;
        assert_eq!(pending[0].payload()["n"], "soon");
        assert_eq!(pending[1].payload()["n"], "late");

        let first = store.lease(QueueName::Tasks, Duration::from_secs(600)).await.unwrap().unwrap();
        assert_eq!(first.envelope().payload()["n"], "soon");
        let second = store.lease(QueueName::Tasks, Duration::from_secs(600)).await.unwrap().unwrap();
        assert_eq!(second.envelope().payload()["n"], "late");
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_lease() {
        let store = Arc::new(InMemoryJobStore::new());
        let waiter = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                store
                    .lease(QueueName::Notifications, Duration::from_secs(5))
                    .await
                    .unwrap()
                    .map(|lease| lease.envelope().job_id())
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let job_id = store
            .enqueue(QueueName::Notifications, json!({}), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(waiter.await.unwrap(), Some(job_id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_job_goes_to_exactly_one_consumer() {
        let store = Arc::new(InMemoryJobStore::new());
        for n in 0..50 {
            store.enqueue(QueueName::Tasks, json!({ "n": n }), Duration::ZERO).await.unwrap();
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(lease) = store
                    .lease(QueueName::Tasks, Duration::from_millis(20))
                    .await
                    .unwrap()
                {
                    seen.push(lease.envelope().payload()["n"].as_i64().unwrap());
                    lease.complete().await.unwrap();
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
        assert_eq!(store.counts(QueueName::Tasks).await.unwrap().completed, 50);
    }
}
