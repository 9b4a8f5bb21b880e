//! Task trait: binds a payload type to the queue it travels on.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::QueueName;

/// A job payload type.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct PollTask { task_id: String }
///
/// impl Task for PollTask {
///     const QUEUE: QueueName = QueueName::Tasks;
/// }
/// ```
///
/// Bounds:
/// - `Serialize` / `DeserializeOwned`: payloads are stored as JSON
/// - `Send + Sync + 'static`: decoded payloads move into handler tasks
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const QUEUE: QueueName;
}
