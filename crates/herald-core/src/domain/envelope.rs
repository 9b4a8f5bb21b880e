//! JobEnvelope: what a store holds for one job instance.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, QueueName};

/// Queue + payload + delay of one job, plus the id the store assigned.
///
/// The payload stays untyped JSON here; the typed layer decodes it into the
/// job type bound to `queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    job_id: JobId,
    queue: QueueName,
    payload: serde_json::Value,
    delay_ms: u64,
    enqueued_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(queue: QueueName, payload: serde_json::Value, delay: Duration) -> Self {
        Self {
            job_id: JobId::generate(),
            queue,
            payload,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            enqueued_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn queue(&self) -> QueueName {
        self.queue
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn into_payload(self) -> serde_json::Value {
        self.payload
    }

    /// Delay requested at enqueue time.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Wall-clock time at which the job becomes eligible for delivery.
    pub fn eligible_at(&self) -> DateTime<Utc> {
        let delay = chrono::Duration::milliseconds(i64::try_from(self.delay_ms).unwrap_or(i64::MAX));
        self.enqueued_at
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_envelope_gets_its_own_id() {
        let a = JobEnvelope::new(QueueName::Tasks, json!({"task_id": "T1"}), Duration::ZERO);
        let b = JobEnvelope::new(QueueName::Tasks, json!({"task_id": "T1"}), Duration::ZERO);
        assert_ne!(a.job_id(), b.job_id());
        assert_eq!(a.payload(), b.payload());
    }

    #[test]
    fn eligible_at_adds_delay() {
        let env = JobEnvelope::new(QueueName::Tasks, json!({}), Duration::from_secs(300));
        assert_eq!(env.delay(), Duration::from_secs(300));
        assert_eq!(
            env.eligible_at() - env.enqueued_at(),
            chrono::Duration::seconds(300)
        );
    }

    #[test]
    fn wire_shape() {
        let env = JobEnvelope::new(QueueName::Notifications, json!({"k": 1}), Duration::from_millis(1500));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["queue"], "notifications");
        assert_eq!(v["delay_ms"], 1500);
        assert_eq!(v["job_id"], env.job_id().as_ulid().to_string());
        let back: JobEnvelope = serde_json::from_value(v).unwrap();
        assert_eq!(back, env);
    }
}
