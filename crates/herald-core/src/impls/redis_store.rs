//! Redis-backed job store.
//!
//! Keys per queue (`<prefix>:<queue>:...`):
//! - `ready`: list, LPUSH on enqueue, popped from the right (FIFO)
//! - `delayed`: sorted set of serialized envelopes scored by eligibility (epoch ms)
//! - `active`: hash job_id -> envelope for leased jobs
//! - `completed` / `failed`: counters
//!
//! A claim is one Lua script so promotion, pop and the `active` write happen
//! atomically on the server. A worker that dies holding a lease leaves its
//! entry in `active`; the job itself is never redelivered. A claimed entry
//! that does not decode is dropped and counted in `failed`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, Script};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{JobEnvelope, JobId, QueueName};
use crate::observability::QueueCounts;
use crate::ports::{JobLease, JobStore, StoreError};

const CLAIM_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, job in ipairs(due) do
  redis.call('ZREM', KEYS[2], job)
  redis.call('LPUSH', KEYS[1], job)
end
local job = redis.call('RPOP', KEYS[1])
if not job then
  return false
end
local ok, decoded = pcall(cjson.decode, job)
local id = ok and type(decoded) == 'table' and decoded['job_id'] or nil
if type(id) ~= 'string' then
  redis.call('INCR', KEYS[4])
  return {'', job}
end
redis.call('HSET', KEYS[3], id, job)
return {id, job}
";

fn store_error(err: RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone)]
struct QueueKeys {
    ready: String,
    delayed: String,
    active: String,
    completed: String,
    failed: String,
}

impl QueueKeys {
    fn new(prefix: &str, queue: QueueName) -> Self {
        let key = |part: &str| format!("{prefix}:{queue}:{part}");
        Self {
            ready: key("ready"),
            delayed: key("delayed"),
            active: key("active"),
            completed: key("completed"),
            failed: key("failed"),
        }
    }
}

pub struct RedisJobStore {
    conn: MultiplexedConnection,
    prefix: String,
    poll_interval: Duration,
    claim: Script,
}

impl RedisJobStore {
    /// Connect to `url`. `poll_interval` is how often an idle `lease` asks
    /// Redis again.
    pub async fn connect(
        url: &str,
        prefix: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(store_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)?;
        let prefix = prefix.into();
        info!(%prefix, "connected to redis job store");
        Ok(Self {
            conn,
            prefix,
            poll_interval,
            claim: Script::new(CLAIM_SCRIPT),
        })
    }

    fn keys(&self, queue: QueueName) -> QueueKeys {
        QueueKeys::new(&self.prefix, queue)
    }

    async fn try_claim(&self, keys: &QueueKeys) -> Result<Option<JobEnvelope>, StoreError> {
        let mut conn = self.conn.clone();
        let now_ms = Utc::now().timestamp_millis();
        let claimed: Option<(String, String)> = self
            .claim
            .key(&keys.ready)
            .key(&keys.delayed)
            .key(&keys.active)
            .key(&keys.failed)
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        let Some((job_id, raw)) = claimed else {
            return Ok(None);
        };

        // An empty id means the script could not read one and already
        // counted the entry as failed without writing it to `active`.
        match serde_json::from_str::<JobEnvelope>(&raw) {
            Ok(envelope) if !job_id.is_empty() => Ok(Some(envelope)),
            Ok(envelope) => Err(StoreError::Backend(format!(
                "claimed job {} without a readable id",
                envelope.job_id()
            ))),
            Err(err) => {
                if !job_id.is_empty() {
                    self.discard(keys, &job_id).await?;
                }
                warn!(active = %keys.active, %job_id, error = %err, "dropped undecodable job");
                Err(err.into())
            }
        }
    }

    /// Remove an undecodable job from `active` and count it as failed.
    async fn discard(&self, keys: &QueueKeys, job_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .hdel(&keys.active, job_id)
            .ignore()
            .incr(&keys.failed, 1)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<JobId, StoreError> {
        let envelope = JobEnvelope::new(queue, payload, delay);
        let job_id = envelope.job_id();
        let raw = serde_json::to_string(&envelope)?;
        let keys = self.keys(queue);
        let mut conn = self.conn.clone();

        if delay.is_zero() {
            let _: () = conn.lpush(&keys.ready, &raw).await.map_err(store_error)?;
        } else {
            let score = envelope.eligible_at().timestamp_millis();
            let _: () = conn
                .zadd(&keys.delayed, &raw, score)
                .await
                .map_err(store_error)?;
        }
        debug!(%queue, %job_id, delay_ms = delay.as_millis() as u64, "job enqueued");
        Ok(job_id)
    }

    async fn lease(
        &self,
        queue: QueueName,
        wait: Duration,
    ) -> Result<Option<Box<dyn JobLease>>, StoreError> {
        let keys = self.keys(queue);
        let deadline = Instant::now() + wait;
        loop {
            if let Some(envelope) = self.try_claim(&keys).await? {
                return Ok(Some(Box::new(RedisLease {
                    envelope,
                    conn: self.conn.clone(),
                    keys,
                })));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, StoreError> {
        let keys = self.keys(queue);
        let mut conn = self.conn.clone();
        let (ready, scheduled, in_flight, completed, failed): (
            usize,
            usize,
            usize,
            Option<u64>,
            Option<u64>,
        ) = redis::pipe()
            .llen(&keys.ready)
            .zcard(&keys.delayed)
            .hlen(&keys.active)
            .get(&keys.completed)
            .get(&keys.failed)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(QueueCounts {
            ready,
            scheduled,
            in_flight,
            completed: completed.unwrap_or(0),
            failed: failed.unwrap_or(0),
        })
    }
}

struct RedisLease {
    envelope: JobEnvelope,
    conn: MultiplexedConnection,
    keys: QueueKeys,
}

impl RedisLease {
    async fn finish(mut self, counter: &str) -> Result<(), StoreError> {
        let job_id = self.envelope.job_id().as_ulid().to_string();
        let _: () = redis::pipe()
            .atomic()
            .hdel(&self.keys.active, job_id)
            .ignore()
            .incr(counter, 1)
            .ignore()
            .query_async(&mut self.conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl JobLease for RedisLease {
    fn envelope(&self) -> &JobEnvelope {
        &self.envelope
    }

    async fn complete(self: Box<Self>) -> Result<(), StoreError> {
        let counter = self.keys.completed.clone();
        (*self).finish(&counter).await
    }

    async fn fail(self: Box<Self>, reason: String) -> Result<(), StoreError> {
        debug!(
            queue = %self.envelope.queue(),
            job_id = %self.envelope.job_id(),
            %reason,
            "job dropped after failure"
        );
        let counter = self.keys.failed.clone();
        (*self).finish(&counter).await
    }
}
