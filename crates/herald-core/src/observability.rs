use serde::{Deserialize, Serialize};

/// Per-queue job counts.
///
/// `completed` and `failed` are running totals of finished leases; the
/// finished jobs themselves are gone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Eligible now, waiting for a worker.
    pub ready: usize,
    /// Waiting for their delay to elapse.
    pub scheduled: usize,
    /// Leased and not yet finished.
    pub in_flight: usize,
    pub completed: u64,
    pub failed: u64,
}

impl QueueCounts {
    /// Jobs still held by the store.
    pub fn pending(&self) -> usize {
        self.ready + self.scheduled
    }
}
