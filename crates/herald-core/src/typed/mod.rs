//! Typed job API.
//!
//! Queue names are never spelled as strings by handlers: a payload type
//! carries its queue, and the registry pairs it with exactly one handler.

pub mod codec;
pub mod handler;
pub mod registry;
pub mod task;

pub use self::codec::{PayloadCodec, enqueue_task};
pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::Task;
