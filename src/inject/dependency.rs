use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::PopulateError;

/// A declared dependency slot: a type, optionally narrowed by provider name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
}

impl Dependency {
    /// Any provider of type `T`; must be unique.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
        }
    }

    /// The provider of type `T` registered or provided under `name`.
    pub fn named<T: Any + Send + Sync>(name: &'static str) -> Self {
        Self {
            name: Some(name),
            ..Self::of::<T>()
        }
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name of the dependency.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Provider name, if narrowed.
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{}({name})", self.type_name),
            None => f.write_str(self.type_name),
        }
    }
}

/// Resolved dependencies of one service, handed to
/// [`Service::populate`](crate::Service::populate).
pub struct Injector<'a> {
    service: &'a str,
    resolved: &'a [(Dependency, Arc<dyn Any + Send + Sync>)],
}

impl<'a> Injector<'a> {
    pub(crate) fn new(
        service: &'a str,
        resolved: &'a [(Dependency, Arc<dyn Any + Send + Sync>)],
    ) -> Self {
        Self { service, resolved }
    }

    /// Returns the declared unnamed dependency of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, PopulateError> {
        self.lookup(Dependency::of::<T>())
    }

    /// Returns the declared dependency of type `T` provided under `name`.
    pub fn get_named<T: Any + Send + Sync>(
        &self,
        name: &'static str,
    ) -> Result<Arc<T>, PopulateError> {
        self.lookup(Dependency::named::<T>(name))
    }

    /// Name of the service being populated.
    pub fn service(&self) -> &str {
        self.service
    }

    fn lookup<T: Any + Send + Sync>(&self, want: Dependency) -> Result<Arc<T>, PopulateError> {
        self.resolved
            .iter()
            .find(|(dep, _)| *dep == want)
            .and_then(|(_, value)| Arc::clone(value).downcast::<T>().ok())
            .ok_or_else(|| PopulateError::Undeclared {
                service: self.service.to_string(),
                dependency: want.to_string(),
            })
    }
}
