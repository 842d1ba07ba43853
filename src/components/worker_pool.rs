use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ServiceError;
use crate::services::Service;

/// A unit of work tracked by the [`WorkerPool`].
pub trait Worker: Send + Sync + 'static {
    /// Performs one unit of work.
    fn do_work(&self);

    /// One-line human-readable status.
    fn status(&self) -> String;
}

/// Roster of registered workers.
///
/// Workers register themselves from their own `init`; the roster is reset by the pool's
/// `init`, which runs first thanks to its higher priority.
#[derive(Default)]
pub struct WorkerPool {
    workers: Mutex<Vec<Arc<dyn Worker>>>,
}

impl WorkerPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a worker to the roster.
    pub fn register(&self, worker: Arc<dyn Worker>) {
        self.workers.lock().push(worker);
    }

    /// Status of every registered worker, in registration order.
    pub fn status(&self) -> Vec<String> {
        self.workers.lock().iter().map(|w| w.status()).collect()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    /// True if no worker registered.
    pub fn is_empty(&self) -> bool {
        self.workers.lock().is_empty()
    }
}

impl Service for WorkerPool {
    fn init(&self) -> Result<(), ServiceError> {
        self.workers.lock().clear();
        Ok(())
    }
}
