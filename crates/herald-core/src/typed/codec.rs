//! PayloadCodec: Task <-> JSON payload, plus typed enqueue.

use std::time::Duration;

use super::task::Task;
use crate::domain::{HeraldError, JobId};
use crate::ports::JobStore;

pub struct PayloadCodec;

impl PayloadCodec {
    pub fn encode<T: Task>(task: &T) -> Result<serde_json::Value, HeraldError> {
        serde_json::to_value(task).map_err(|e| HeraldError::Decode {
            queue: T::QUEUE,
            message: format!("json encode: {e}"),
        })
    }

    pub fn decode<T: Task>(payload: serde_json::Value) -> Result<T, HeraldError> {
        serde_json::from_value(payload).map_err(|e| HeraldError::Decode {
            queue: T::QUEUE,
            message: format!("json decode: {e}"),
        })
    }
}

/// Enqueue `task` on its own queue.
pub async fn enqueue_task<T: Task>(
    store: &dyn JobStore,
    task: &T,
    delay: Duration,
) -> Result<JobId, HeraldError> {
    let payload = PayloadCodec::encode(task)?;
    Ok(store.enqueue(T::QUEUE, payload, delay).await?)
}
