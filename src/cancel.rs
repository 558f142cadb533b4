//! Cooperative cancellation for partitioned builds and queries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag a caller flips to abandon a long-running partitioned operation.
///
/// Workers check the flag before starting each partition. Once it is set,
/// the operation returns `Cancelled` and any partitions that did complete
/// are discarded rather than merged.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
