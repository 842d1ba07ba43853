//! # LogWriter: lifecycle events as `tracing` records
//!
//! Startup and normal stops log at `info`, crashes and init failures at `error`,
//! overflow/grace problems at `warn`. The process installs the actual `tracing`
//! subscriber (format, filter, sink) once at startup.
//!
//! ## Example output
//! ```text
//! INFO svcvisor::log: Initializing service=WorkerPool priority=99
//! INFO svcvisor::log: Starting service=WorkerA
//! ERROR svcvisor::log: Stopped service=WorkerB reason=execution failed: boom
//! INFO svcvisor::log: Shutdown started reason=System signal: SIGTERM
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "svcvisor::log";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::DependenciesPopulated => {
                debug!(target: TARGET, %reason, "Dependencies populated");
            }
            EventKind::ServiceInitializing => {
                let priority = e.priority.map(|p| p.get());
                info!(target: TARGET, %service, ?priority, "Initializing");
            }
            EventKind::ServiceDisabled => {
                info!(target: TARGET, %service, "Disabled, skipping");
            }
            EventKind::ServiceInitFailed => {
                error!(target: TARGET, %service, %reason, "Init failed");
            }
            EventKind::ServiceStarting => {
                info!(target: TARGET, %service, "Starting");
            }
            EventKind::ServiceSkipped => {
                info!(target: TARGET, %service, "Not started, shutdown in progress");
            }
            EventKind::ServiceStopped => {
                info!(target: TARGET, %service, %reason, "Stopped");
            }
            EventKind::ServiceCrashed => {
                error!(target: TARGET, %service, %reason, "Stopped");
            }
            EventKind::ShutdownRequested => {
                info!(target: TARGET, %reason, "Shutdown started");
            }
            EventKind::AllStoppedWithin => {
                info!(target: TARGET, "All services stopped within grace");
            }
            EventKind::GraceExceeded => {
                warn!(target: TARGET, grace_ms = ?e.grace_ms, stuck = %reason, "Grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = %service, %reason, "Subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: TARGET, subscriber = %service, info = %reason, "Subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
