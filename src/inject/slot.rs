use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::ServiceError;

/// Write-once holder for an injected dependency.
///
/// Filling is idempotent: the first value stays, later fills are ignored.
pub struct Slot<T: ?Sized> {
    cell: OnceLock<Arc<T>>,
}

impl<T: ?Sized> Slot<T> {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Stores `value` unless the slot is already filled.
    pub fn fill(&self, value: Arc<T>) {
        let _ = self.cell.set(value);
    }

    /// Returns the injected value.
    pub fn get(&self) -> Result<&Arc<T>, ServiceError> {
        self.cell.get().ok_or(ServiceError::Unpopulated {
            dependency: std::any::type_name::<T>(),
        })
    }

    /// True once filled.
    pub fn is_filled(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: ?Sized> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("type", &std::any::type_name::<T>())
            .field("filled", &self.is_filled())
            .finish()
    }
}
