//! Error types used by the svcvisor runtime and by services.
//!
//! - [`RuntimeError`]: errors raised by the orchestration runtime itself.
//! - [`ServiceError`]: errors raised by a service's `init` or `run`.
//! - [`PopulateError`]: dependency resolution failures (fatal before any `init`).
//! - [`RegistryError`]: registration failures.
//!
//! Every enum provides `as_label` (short snake_case label for logs/metrics).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the svcvisor runtime.
///
/// One of these is the terminal outcome of [`Server::run`](crate::Server::run).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `run` was called a second time on the same server.
    #[error("server already started")]
    AlreadyStarted,

    /// Dependency population failed; no service was initialized.
    #[error("failed to populate service dependencies: {0}")]
    Populate(#[from] PopulateError),

    /// A service's `init` failed; startup was aborted.
    #[error("service {service} init failed: {source}")]
    Init {
        /// Name of the failing service.
        service: String,
        /// The error returned by `init`.
        source: ServiceError,
    },

    /// A background service returned a non-cancellation error.
    #[error("service {service} crashed: {source}")]
    Crashed {
        /// Name of the crashed service.
        service: String,
        /// The error returned by `run`.
        source: ServiceError,
    },

    /// Shutdown grace period was exceeded; the listed services were left behind.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Services that did not stop in time.
        stuck: Vec<String>,
    },

    /// Every service stopped because the run was cancelled.
    #[error("context cancelled")]
    Canceled,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use svcvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::Canceled.as_label(), "runtime_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::Populate(_) => "runtime_populate_failed",
            RuntimeError::Init { .. } => "runtime_init_failed",
            RuntimeError::Crashed { .. } => "runtime_service_crashed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Canceled => "runtime_canceled",
        }
    }

    /// True for the cancellation sentinel.
    pub fn is_canceled(&self) -> bool {
        matches!(self, RuntimeError::Canceled)
    }
}

/// # Errors produced by a service.
///
/// [`ServiceError::Canceled`] is the cooperative-stop sentinel: a background service
/// returns it when it stopped because its cancellation token fired.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Invalid or missing configuration detected during `init`.
    #[error("invalid configuration {key}: {reason}")]
    Config {
        /// Offending settings key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Generic failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A dependency slot was read before population.
    #[error("dependency {dependency} is not populated")]
    Unpopulated {
        /// Type name of the missing dependency.
        dependency: &'static str,
    },

    /// The service's `init` or `run` panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },

    /// The service stopped because its context was cancelled.
    #[error("context cancelled")]
    Canceled,
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ServiceError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`ServiceError::Config`].
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use svcvisor::ServiceError;
    ///
    /// let err = ServiceError::fail("boom");
    /// assert_eq!(err.as_label(), "service_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Config { .. } => "service_config",
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Unpopulated { .. } => "service_unpopulated",
            ServiceError::Panicked { .. } => "service_panicked",
            ServiceError::Canceled => "service_canceled",
        }
    }

    /// True for the cancellation sentinel.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ServiceError::Canceled)
    }
}

/// # Dependency population failures.
///
/// All of them are startup-time configuration errors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PopulateError {
    /// Nothing provides the requested dependency.
    #[error("{service}: no provider for {dependency}")]
    Unresolved {
        /// Requesting service.
        service: String,
        /// Requested dependency (type name, plus name if any).
        dependency: String,
    },

    /// More than one provider matches the requested dependency.
    #[error("{service}: ambiguous dependency {dependency}, candidates: {candidates:?}")]
    Ambiguous {
        /// Requesting service.
        service: String,
        /// Requested dependency.
        dependency: String,
        /// Names of all matching providers.
        candidates: Vec<String>,
    },

    /// Services depend on each other in a loop.
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// Service names along the cycle; first and last are equal.
        path: Vec<String>,
    },

    /// A service asked the injector for something it did not declare.
    #[error("{service}: dependency {dependency} was not declared")]
    Undeclared {
        /// Requesting service.
        service: String,
        /// Requested dependency.
        dependency: String,
    },
}

impl PopulateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PopulateError::Unresolved { .. } => "populate_unresolved",
            PopulateError::Ambiguous { .. } => "populate_ambiguous",
            PopulateError::Cycle { .. } => "populate_cycle",
            PopulateError::Undeclared { .. } => "populate_undeclared",
        }
    }
}

/// # Registration failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Orchestration already began; the registry is read-only.
    #[error("registry is sealed; cannot register {name}")]
    Sealed {
        /// Name of the rejected service.
        name: String,
    },

    /// Another service was registered under the same name.
    #[error("service {name} is already registered")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Sealed { .. } => "registry_sealed",
            RegistryError::DuplicateName { .. } => "registry_duplicate_name",
        }
    }
}
