//! Bounded worker pool for report builds.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::BatchError;

/// Caps how many builds run at once.
///
/// Cloning shares the same permits. The orchestrator always receives a pool
/// explicitly; there is no process-wide default instance.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// A pool running at most `size` builds at once (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Available parallelism minus one for the coordinator, at least 1.
    pub fn default_size() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .saturating_sub(1)
            .max(1)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a build.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit, BatchError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| BatchError::PoolClosed)
    }

    /// Refuse all further acquisitions.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}
