//! Handler trait and its type-erased form.
//!
//! - `Handler<T>`: what application code implements, typed by payload
//! - `DynHandler`: object-safe, takes raw JSON; what the registry stores
//! - `TypedHandler<T, H>`: adapter from the first to the second

use std::marker::PhantomData;

use async_trait::async_trait;

use super::codec::PayloadCodec;
use super::task::Task;
use crate::domain::{HeraldError, Outcome, QueueName};

/// Runs one job of type `T`.
///
/// `Handler<PollTask>` only ever receives `PollTask`s; the pairing is checked
/// at compile time.
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, job: T) -> Result<Outcome, HeraldError>;
}

#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<Outcome, HeraldError>;
    fn queue(&self) -> QueueName;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<Outcome, HeraldError> {
        let job: T = PayloadCodec::decode(payload)?;
        self.handler.handle(job).await
    }

    fn queue(&self) -> QueueName {
        T::QUEUE
    }
}
