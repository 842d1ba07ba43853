//! # Service descriptors.
//!
//! A [`Descriptor`] binds one service instance to its name, its init [`Priority`] and
//! its registration index. It also keeps the instance as `Arc<dyn Any>` so the
//! populator can hand the concrete type to dependents.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::services::{Background, Service};

/// Init priority. Higher initializes earlier; ties keep registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i32);

impl Priority {
    /// Infrastructure other services build on (pools, controllers).
    pub const HIGH: Priority = Priority(100);
    /// Default.
    pub const LOW: Priority = Priority(0);

    /// Creates a priority.
    #[inline]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Raw value.
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability set recorded at registration.
#[derive(Clone)]
pub enum Capability {
    /// `init` only.
    InitOnly,
    /// `init`, then a long-running `run`.
    Background(Arc<dyn Background>),
}

/// Registry record for one service.
#[derive(Clone)]
pub struct Descriptor {
    name: Arc<str>,
    priority: Priority,
    seq: usize,
    instance: Arc<dyn Service>,
    any: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    capability: Capability,
}

impl Descriptor {
    pub(crate) fn init_only<S: Service>(
        name: Arc<str>,
        instance: Arc<S>,
        priority: Priority,
        seq: usize,
    ) -> Self {
        Self {
            name,
            priority,
            seq,
            any: instance.clone(),
            instance,
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            capability: Capability::InitOnly,
        }
    }

    pub(crate) fn with_runner<S: Background>(
        name: Arc<str>,
        instance: Arc<S>,
        priority: Priority,
        seq: usize,
    ) -> Self {
        let runner: Arc<dyn Background> = instance.clone();
        Self {
            name,
            priority,
            seq,
            any: instance.clone(),
            instance,
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            capability: Capability::Background(runner),
        }
    }

    /// Service name, unique within the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Init priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Registration index (0-based).
    pub fn seq(&self) -> usize {
        self.seq
    }

    /// The service instance.
    pub fn instance(&self) -> &Arc<dyn Service> {
        &self.instance
    }

    /// Capability set.
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Long-running handle, if the service has one.
    pub fn background(&self) -> Option<&Arc<dyn Background>> {
        match &self.capability {
            Capability::Background(b) => Some(b),
            Capability::InitOnly => None,
        }
    }

    /// Asks the instance whether it is disabled.
    pub fn is_disabled(&self) -> bool {
        self.instance.is_disabled()
    }

    pub(crate) fn any(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.any
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name of the concrete instance.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("background", &self.background().is_some())
            .finish()
    }
}

/// Short name of a type: last path segment, generics stripped.
///
/// `my_app::workers::Pool<u8>` becomes `Pool`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
