//! TypedRegistry: one handler per queue.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;
use crate::domain::QueueName;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a handler for queue '{0}' is already registered")]
    AlreadyRegistered(QueueName),
}

/// Built mutably at startup, shared read-only by workers afterwards.
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<QueueName, Arc<dyn DynHandler>>,
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&T::QUEUE) {
            return Err(RegistryError::AlreadyRegistered(T::QUEUE));
        }
        self.handlers
            .insert(T::QUEUE, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, queue: QueueName) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&queue).cloned()
    }

    /// Registered queues in a stable order.
    pub fn registered_queues(&self) -> Vec<QueueName> {
        let mut queues: Vec<QueueName> = self.handlers.keys().copied().collect();
        queues.sort();
        queues
    }
}
