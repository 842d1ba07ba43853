//! # Service registry.
//!
//! Append-only table of [`Descriptor`]s built by the entry point before the server runs.
//!
//! ## Rules
//! - Names are unique; by default derived from the concrete type name.
//! - [`Registry::snapshot`] orders by priority descending, then registration order.
//! - The server seals the registry when a run starts; later registrations fail.
//!
//! ```text
//! register(A, 10) ─┐
//! register(B, 99) ─┼─► [A(10,#0), B(99,#1), C(10,#2)] ──snapshot()──► [B, A, C]
//! register(C, 10) ─┘
//! ```

mod descriptor;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::RegistryError;
use crate::services::{Background, Service};

pub use descriptor::{Capability, Descriptor, Priority};
pub(crate) use descriptor::short_type_name;

/// Table of registered services.
#[derive(Default)]
pub struct Registry {
    services: RwLock<Vec<Descriptor>>,
    sealed: AtomicBool,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an init-only service named after its type.
    pub fn register<S: Service>(
        &self,
        instance: Arc<S>,
        priority: impl Into<Priority>,
    ) -> Result<(), RegistryError> {
        self.register_as(short_type_name::<S>(), instance, priority)
    }

    /// Registers an init-only service under an explicit name.
    pub fn register_as<S: Service>(
        &self,
        name: impl Into<Arc<str>>,
        instance: Arc<S>,
        priority: impl Into<Priority>,
    ) -> Result<(), RegistryError> {
        let priority = priority.into();
        self.push(name.into(), |name, seq| {
            Descriptor::init_only(name, instance, priority, seq)
        })
    }

    /// Registers a long-running service named after its type.
    pub fn register_background<S: Background>(
        &self,
        instance: Arc<S>,
        priority: impl Into<Priority>,
    ) -> Result<(), RegistryError> {
        self.register_background_as(short_type_name::<S>(), instance, priority)
    }

    /// Registers a long-running service under an explicit name.
    pub fn register_background_as<S: Background>(
        &self,
        name: impl Into<Arc<str>>,
        instance: Arc<S>,
        priority: impl Into<Priority>,
    ) -> Result<(), RegistryError> {
        let priority = priority.into();
        self.push(name.into(), |name, seq| {
            Descriptor::with_runner(name, instance, priority, seq)
        })
    }

    fn push(
        &self,
        name: Arc<str>,
        make: impl FnOnce(Arc<str>, usize) -> Descriptor,
    ) -> Result<(), RegistryError> {
        let mut services = self.services.write();
        // checked under the write lock so sealing cannot race a registration
        if self.sealed.load(Ordering::Acquire) {
            return Err(RegistryError::Sealed {
                name: name.to_string(),
            });
        }
        if services.iter().any(|d| d.name() == &*name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }
        let seq = services.len();
        services.push(make(name, seq));
        Ok(())
    }

    /// Returns all descriptors, priority descending, ties in registration order.
    pub fn snapshot(&self) -> Vec<Descriptor> {
        let mut out = self.services.read().clone();
        out.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.seq().cmp(&b.seq()))
        });
        out
    }

    /// Names in snapshot order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// True once a run has started.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Closes the registration phase.
    pub(crate) fn seal(&self) {
        let _guard = self.services.write();
        self.sealed.store(true, Ordering::Release);
    }
}
