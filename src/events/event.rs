//! # Runtime events emitted by the server.
//!
//! [`EventKind`] classifies events in three groups:
//! - **Startup**: population and the sequential init pass
//! - **Run**: background services starting, stopping, crashing
//! - **Shutdown**: shutdown requests and the bounded wait
//!
//! Each event carries a globally increasing `seq`.
//!
//! ## Example
//! ```rust
//! use svcvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ServiceCrashed)
//!     .with_service("WorkerA")
//!     .with_reason("execution failed: boom");
//!
//! assert_eq!(ev.kind, EventKind::ServiceCrashed);
//! assert_eq!(ev.service.as_deref(), Some("WorkerA"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::registry::Priority;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `service` (subscriber name) and `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `service` (subscriber name) and `reason`.
    SubscriberOverflow,

    // === Startup events ===
    /// All dependencies were resolved and injected.
    ///
    /// Sets `reason` (summary).
    DependenciesPopulated,

    /// A service is about to be initialized.
    ///
    /// Sets `service`, `priority`.
    ServiceInitializing,

    /// A service reported itself disabled; it gets neither init nor run.
    ///
    /// Sets `service`, `priority`.
    ServiceDisabled,

    /// A service's init failed; startup is aborted.
    ///
    /// Sets `service`, `reason`.
    ServiceInitFailed,

    // === Run events ===
    /// A background service is starting its run.
    ///
    /// Sets `service`.
    ServiceStarting,

    /// A background service was not started because shutdown had begun.
    ///
    /// Sets `service`.
    ServiceSkipped,

    /// A background service stopped normally (finished or cancelled).
    ///
    /// Sets `service`, `reason`.
    ServiceStopped,

    /// A background service failed; the whole run shuts down.
    ///
    /// Sets `service`, `reason`.
    ServiceCrashed,

    // === Shutdown events ===
    /// Shutdown began (explicit request, signal, or crash).
    ///
    /// Sets `reason`.
    ShutdownRequested,

    /// All background services stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some services did not stop in time.
    ///
    /// Sets `grace_ms`, `reason` (stuck services).
    GraceExceeded,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the service, if applicable.
    pub service: Option<Arc<str>>,
    /// Human-readable reason (errors, shutdown reasons, overflow details).
    pub reason: Option<Arc<str>>,
    /// Init priority of the service.
    pub priority: Option<Priority>,
    /// Grace period in milliseconds.
    pub grace_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            reason: None,
            priority: None,
            grace_ms: None,
        }
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an init priority.
    #[inline]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attaches a grace period (stored as milliseconds).
    #[inline]
    pub fn with_grace(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.grace_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }
}
