//! # Service abstractions.
//!
//! - [`Service`]: the mandatory capability: dependency declaration, population and `init`.
//!   Disabling is an optional capability expressed by overriding [`Service::is_disabled`].
//! - [`Background`]: the optional long-running capability, started after every enabled
//!   service initialized.
//!
//! A service is registered once per run with a priority. Which capabilities it carries
//! is fixed at registration time ([`Registry::register`](crate::Registry::register) vs
//! [`Registry::register_background`](crate::Registry::register_background)).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{PopulateError, ServiceError};
use crate::inject::{Dependency, Injector};

/// # A registrable service.
///
/// Lifecycle, driven by [`Server::run`](crate::Server::run):
/// 1. [`dependencies`](Service::dependencies) and [`populate`](Service::populate), once,
///    before anything is initialized;
/// 2. [`is_disabled`](Service::is_disabled), once; a disabled service is never
///    initialized nor run;
/// 3. [`init`](Service::init), in priority order, never concurrently with another `init`.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use svcvisor::{Dependency, Injector, PopulateError, Service, ServiceError, Slot};
/// use svcvisor::components::WorkerPool;
///
/// #[derive(Default)]
/// struct Audit {
///     pool: Slot<WorkerPool>,
/// }
///
/// impl Service for Audit {
///     fn dependencies(&self) -> Vec<Dependency> {
///         vec![Dependency::of::<WorkerPool>()]
///     }
///
///     fn populate(&self, deps: &Injector<'_>) -> Result<(), PopulateError> {
///         self.pool.fill(deps.get::<WorkerPool>()?);
///         Ok(())
///     }
///
///     fn init(&self) -> Result<(), ServiceError> {
///         let _workers = self.pool.get()?.status();
///         Ok(())
///     }
/// }
/// ```
pub trait Service: Send + Sync + 'static {
    /// Dependency slots this service needs. Default: none.
    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    /// Receives the resolved dependencies declared by [`dependencies`](Service::dependencies).
    fn populate(&self, deps: &Injector<'_>) -> Result<(), PopulateError> {
        let _ = deps;
        Ok(())
    }

    /// One-time initialization. Higher-priority services are already initialized.
    fn init(&self) -> Result<(), ServiceError>;

    /// Returns true if this service must be skipped for the whole run.
    fn is_disabled(&self) -> bool {
        false
    }
}

/// # Long-running capability.
///
/// [`run`](Background::run) executes on its own task. It must observe `ctx` and return
/// [`ServiceError::Canceled`] (or `Ok`) promptly once it fires; any other error is a crash
/// that brings the whole run down.
#[async_trait]
pub trait Background: Service {
    /// Runs until completion, failure, or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError>;
}
