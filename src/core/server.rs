//! # Server: populates, initializes and runs registered services, then stops them.
//!
//! ```text
//! run()
//!   ├─ seal Registry, take priority-ordered snapshot
//!   ├─ Populating    Populator::populate(snapshot)           error → Stopped
//!   ├─ Initializing  for d in snapshot (sequential):
//!   │                   disabled? → ServiceDisabled, skip
//!   │                   d.init()  → error → ServiceInitFailed → Stopped
//!   ├─ Running       one task per enabled Background service
//!   │                   child = token.child_token()
//!   │                   shutdown begun? → ServiceSkipped
//!   │                   run(child) (panics caught)
//!   └─ join loop     Ok / Canceled      → ServiceStopped
//!                    other error/panic  → ServiceCrashed → record, cancel everyone
//!                    token cancelled    → ShuttingDown, start grace deadline
//!                    deadline expired   → GraceExceeded, detach leftovers
//!
//! shutdown(reason)
//!   ├─ reason: first call wins
//!   ├─ in-progress flag, token.cancel()   (idempotent)
//!   └─ waits for Stopped
//! ```
//!
//! ## Rules
//! - `init` calls are strictly sequential, in snapshot order, on the task calling `run`.
//! - The aggregate result is the first non-cancellation error, else
//!   [`RuntimeError::Canceled`] if any service stopped by cancellation, else `Ok`.
//! - The error slot is written only by the join loop; join order decides "first".
//! - Tasks are never aborted: after the grace period they are detached.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use svcvisor::{Background, LogWriter, Registry, Server, ServerConfig, Service, ServiceError};
//!
//! struct Ticker;
//!
//! impl Service for Ticker {
//!     fn init(&self) -> Result<(), ServiceError> {
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl Background for Ticker {
//!     async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
//!         ctx.cancelled().await;
//!         Err(ServiceError::Canceled)
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let registry = Arc::new(Registry::new());
//!     registry.register_background(Arc::new(Ticker), 10).unwrap();
//!
//!     let server = Server::builder(registry)
//!         .with_config(ServerConfig::default())
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build();
//!
//!     let runner = {
//!         let server = Arc::clone(&server);
//!         tokio::spawn(async move { server.run().await })
//!     };
//!     server.shutdown("example finished").await;
//!
//!     let result = runner.await.unwrap();
//!     assert_eq!(server.exit_code(&result), 0);
//! }
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast::error::RecvError, broadcast::error::TryRecvError, watch};
use tokio::task::{Id, JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::{ServerBuilder, ServerConfig, shutdown};
use crate::error::{RuntimeError, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::inject::Populator;
use crate::registry::{Descriptor, Registry};
use crate::subscribers::{Subscribe, SubscriberSet, panic_info};

/// Lifecycle phase of a [`Server`]. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Built, `run` not called yet.
    Created,
    /// Resolving and injecting dependencies.
    Populating,
    /// Calling `init` in priority order.
    Initializing,
    /// Background services are running.
    Running,
    /// Cancellation was triggered; waiting for services to stop.
    ShuttingDown,
    /// `run` is about to return.
    Stopped,
}

/// How one background task ended.
enum Exit {
    /// Shutdown began before the task got to call `run`.
    Skipped,
    /// `run` returned (a panic is converted to [`ServiceError::Panicked`]).
    Finished(Result<(), ServiceError>),
}

/// First-error slot of a run.
#[derive(Default)]
struct Outcome {
    first: Option<RuntimeError>,
}

impl Outcome {
    /// Keeps the first non-cancellation error; cancellation only fills an empty slot.
    fn record(&mut self, err: RuntimeError) {
        match &self.first {
            None => self.first = Some(err),
            Some(prev) if prev.is_canceled() && !err.is_canceled() => self.first = Some(err),
            Some(_) => {}
        }
    }

    fn into_result(self) -> Result<(), RuntimeError> {
        match self.first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Moves the server to [`Phase::Stopped`] when `run` ends, including by unwinding.
struct StopGuard<'a> {
    server: &'a Server,
    listener: Option<CancellationToken>,
    finished: bool,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.server.token.cancel();
            if let Some(stop) = self.listener.take() {
                stop.cancel();
            }
        }
        self.server.advance(Phase::Stopped);
    }
}

/// Orchestrates the services of one [`Registry`] for one run.
pub struct Server {
    cfg: ServerConfig,
    registry: Arc<Registry>,
    bus: Bus,
    subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
    populator: Mutex<Option<Populator>>,
    token: CancellationToken,
    reason: OnceLock<String>,
    shutting_down: Arc<AtomicBool>,
    started: AtomicBool,
    outcome_logged: AtomicBool,
    phase: watch::Sender<Phase>,
}

impl Server {
    /// Starts building a server for `registry`.
    pub fn builder(registry: Arc<Registry>) -> ServerBuilder {
        ServerBuilder::new(registry)
    }

    pub(crate) fn new_internal(
        cfg: ServerConfig,
        registry: Arc<Registry>,
        subscribers: Vec<Arc<dyn Subscribe>>,
        populator: Populator,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let (phase, _) = watch::channel(Phase::Created);
        Self {
            cfg,
            registry,
            bus,
            subscribers: Mutex::new(subscribers),
            populator: Mutex::new(Some(populator)),
            token: CancellationToken::new(),
            reason: OnceLock::new(),
            shutting_down: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            outcome_logged: AtomicBool::new(false),
            phase,
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    /// The registry this server runs.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Event bus; subscribe to observe lifecycle events directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver that observes phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Recorded shutdown reason, if any.
    pub fn shutdown_reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// True once shutdown began (explicit request, signal, or crash). Never resets.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Runs the whole lifecycle once: populate, init, run, stop.
    ///
    /// Returns when every started background service returned, or when the grace
    /// period after cancellation expired.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.registry.seal();
        self.advance(Phase::Populating);

        let listener = self.subscriber_listener();
        let mut guard = StopGuard {
            server: self,
            listener: listener.as_ref().map(|(stop, _)| stop.clone()),
            finished: false,
        };
        let res = self.drive().await;

        if let Some((stop, handle)) = listener {
            stop.cancel();
            let _ = handle.await;
        }
        guard.finished = true;
        drop(guard);
        res
    }

    async fn drive(&self) -> Result<(), RuntimeError> {
        let services = self.registry.snapshot();

        let populator = self.populator.lock().take().unwrap_or_default();
        populator.populate(&services)?;
        self.bus.publish(
            Event::new(EventKind::DependenciesPopulated).with_reason(format!(
                "services={} roots={}",
                services.len(),
                populator.roots()
            )),
        );

        self.advance(Phase::Initializing);
        let enabled = self.init_all(&services)?;

        self.advance(Phase::Running);
        let mut set = JoinSet::new();
        let mut launched = HashMap::new();
        for d in &enabled {
            if let Some(id) = self.spawn_background(&mut set, d) {
                launched.insert(id, d.name_arc());
            }
        }
        self.join_all(set, launched).await
    }

    /// Calls `init` on every enabled service in snapshot order; returns the enabled ones.
    fn init_all(&self, services: &[Descriptor]) -> Result<Vec<Descriptor>, RuntimeError> {
        let mut enabled = Vec::with_capacity(services.len());
        for d in services {
            if d.is_disabled() {
                self.bus.publish(
                    Event::new(EventKind::ServiceDisabled)
                        .with_service(d.name_arc())
                        .with_priority(d.priority()),
                );
                continue;
            }
            self.bus.publish(
                Event::new(EventKind::ServiceInitializing)
                    .with_service(d.name_arc())
                    .with_priority(d.priority()),
            );
            let inited = std::panic::catch_unwind(AssertUnwindSafe(|| d.instance().init()))
                .unwrap_or_else(|payload| {
                    Err(ServiceError::Panicked {
                        info: panic_info(&*payload),
                    })
                });
            if let Err(source) = inited {
                self.bus.publish(
                    Event::new(EventKind::ServiceInitFailed)
                        .with_service(d.name_arc())
                        .with_reason(source.to_string()),
                );
                return Err(RuntimeError::Init {
                    service: d.name().to_string(),
                    source,
                });
            }
            enabled.push(d.clone());
        }
        Ok(enabled)
    }

    /// Spawns the task of a background service. Returns `None` for init-only services.
    fn spawn_background(
        &self,
        set: &mut JoinSet<(Arc<str>, Exit)>,
        d: &Descriptor,
    ) -> Option<Id> {
        let svc = d.background().cloned()?;
        let name = d.name_arc();
        let ctx = self.token.child_token();
        let bus = self.bus.clone();
        let shutting_down = Arc::clone(&self.shutting_down);

        let handle = set.spawn(async move {
            if shutting_down.load(Ordering::Acquire) {
                return (name, Exit::Skipped);
            }
            bus.publish(Event::new(EventKind::ServiceStarting).with_service(Arc::clone(&name)));

            let res = match AssertUnwindSafe(svc.run(ctx))
                .catch_unwind()
                .await
            {
                Ok(res) => res,
                Err(payload) => Err(ServiceError::Panicked {
                    info: panic_info(&*payload),
                }),
            };
            (name, Exit::Finished(res))
        });
        Some(handle.id())
    }

    /// Joins every task, bounded by the grace period once cancellation fired.
    async fn join_all(
        &self,
        mut set: JoinSet<(Arc<str>, Exit)>,
        mut pending: HashMap<Id, Arc<str>>,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let mut outcome = Outcome::default();
        let mut deadline: Option<Instant> = None;

        loop {
            if deadline.is_none() && self.token.is_cancelled() {
                self.advance(Phase::ShuttingDown);
                deadline = Some(Instant::now() + grace);
            }
            let expiry = async move {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                joined = set.join_next_with_id() => match joined {
                    None => break,
                    Some(Ok((id, (name, exit)))) => {
                        pending.remove(&id);
                        self.on_exit(name, exit, &mut outcome);
                    }
                    Some(Err(err)) => {
                        let service = pending
                            .remove(&err.id())
                            .map_or_else(|| "unknown".to_string(), |n| n.to_string());
                        outcome.record(RuntimeError::Crashed {
                            service: service.clone(),
                            source: ServiceError::Panicked { info: err.to_string() },
                        });
                        self.begin_shutdown(&format!("service {service} was lost"));
                    }
                },
                _ = self.token.cancelled(), if deadline.is_none() => {}
                _ = expiry => {
                    let mut stuck: Vec<String> = pending.values().map(|n| n.to_string()).collect();
                    stuck.sort();
                    set.detach_all();
                    self.bus.publish(
                        Event::new(EventKind::GraceExceeded)
                            .with_grace(grace)
                            .with_reason(stuck.join(", ")),
                    );
                    outcome.record(RuntimeError::GraceExceeded { grace, stuck });
                    return outcome.into_result();
                }
            }
        }

        if deadline.is_some() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
        }
        outcome.into_result()
    }

    fn on_exit(&self, name: Arc<str>, exit: Exit, outcome: &mut Outcome) {
        match exit {
            Exit::Skipped => {
                self.bus
                    .publish(Event::new(EventKind::ServiceSkipped).with_service(name));
                outcome.record(RuntimeError::Canceled);
            }
            Exit::Finished(Ok(())) => {
                self.bus.publish(
                    Event::new(EventKind::ServiceStopped)
                        .with_service(name)
                        .with_reason("finished"),
                );
            }
            Exit::Finished(Err(e)) if e.is_canceled() => {
                self.bus.publish(
                    Event::new(EventKind::ServiceStopped)
                        .with_service(name)
                        .with_reason("cancelled"),
                );
                outcome.record(RuntimeError::Canceled);
            }
            Exit::Finished(Err(source)) => {
                self.bus.publish(
                    Event::new(EventKind::ServiceCrashed)
                        .with_service(Arc::clone(&name))
                        .with_reason(source.to_string()),
                );
                self.begin_shutdown(&format!("service {name} crashed"));
                outcome.record(RuntimeError::Crashed {
                    service: name.to_string(),
                    source,
                });
            }
        }
    }

    /// Records `reason` (first call wins) and cancels every service, without waiting.
    ///
    /// Returns true if this call recorded the reason. Safe to call from inside a
    /// running service.
    pub fn request_shutdown(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let recorded = self.reason.set(reason.clone()).is_ok();
        if !recorded {
            tracing::debug!(ignored = %reason, "Shutdown reason already recorded");
        }
        self.begin_shutdown(&reason);
        recorded
    }

    /// Requests shutdown and waits until the run stopped.
    ///
    /// Returns immediately if `run` was never called; the next `run` then skips
    /// every background service.
    pub async fn shutdown(&self, reason: impl Into<String>) {
        self.request_shutdown(reason);
        if self.phase() == Phase::Created {
            return;
        }
        self.wait_stopped().await;
    }

    async fn wait_stopped(&self) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|p| *p == Phase::Stopped).await;
    }

    fn begin_shutdown(&self, reason: &str) {
        let first = !self.shutting_down.swap(true, Ordering::AcqRel);
        self.token.cancel();
        self.phase.send_if_modified(|p| {
            if *p > Phase::Created && *p < Phase::ShuttingDown {
                *p = Phase::ShuttingDown;
                true
            } else {
                false
            }
        });
        if first {
            self.bus
                .publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));
        }
    }

    /// Maps the result of [`run`](Server::run) to a process exit code and logs it once.
    ///
    /// `0` only if the run ended with `Ok` or [`RuntimeError::Canceled`] and a shutdown
    /// reason was recorded; `1` otherwise.
    pub fn exit_code(&self, result: &Result<(), RuntimeError>) -> i32 {
        let clean = match result {
            Ok(()) => true,
            Err(e) => e.is_canceled(),
        };
        let reason = self.shutdown_reason();
        let code = match (clean, reason) {
            (true, Some(_)) => 0,
            _ => 1,
        };

        if !self.outcome_logged.swap(true, Ordering::AcqRel) {
            match (result, reason) {
                (_, Some(reason)) if code == 0 => {
                    tracing::info!(%reason, "Server shutdown complete");
                }
                (Err(e), _) if !e.is_canceled() => {
                    tracing::error!(error = %e, label = e.as_label(), "Server stopped with error");
                }
                _ => {
                    tracing::error!("Server stopped without a shutdown reason");
                }
            }
        }
        code
    }

    /// Spawns a task that turns the first termination signal into
    /// `shutdown("System signal: <name>")`. The task ends when the server stops.
    pub fn spawn_signal_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                sig = shutdown::wait_for_shutdown_signal() => match sig {
                    Ok(name) => server.shutdown(format!("System signal: {name}")).await,
                    Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
                },
                _ = server.wait_stopped() => {}
            }
        })
    }

    /// Moves the phase forward; never backwards.
    fn advance(&self, next: Phase) {
        self.phase.send_if_modified(|p| {
            if next > *p {
                *p = next;
                true
            } else {
                false
            }
        });
    }

    /// Forwards bus events to the subscribers until stopped, then drains and flushes.
    fn subscriber_listener(&self) -> Option<(CancellationToken, JoinHandle<()>)> {
        let subs = std::mem::take(&mut *self.subscribers.lock());
        if subs.is_empty() {
            return None;
        }
        let set = SubscriberSet::new(subs, self.bus.clone());
        let mut rx = self.bus.subscribe();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = stopped.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        Some((stop, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::services::{Background, Service};

    struct Idle;

    impl Service for Idle {
        fn init(&self) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Background for Idle {
        async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
            ctx.cancelled().await;
            Err(ServiceError::Canceled)
        }
    }

    #[test]
    fn test_outcome_keeps_first_real_error() {
        let mut outcome = Outcome::default();
        outcome.record(RuntimeError::Canceled);
        outcome.record(RuntimeError::Crashed {
            service: "B".into(),
            source: ServiceError::fail("first"),
        });
        outcome.record(RuntimeError::Crashed {
            service: "C".into(),
            source: ServiceError::fail("second"),
        });
        outcome.record(RuntimeError::Canceled);

        match outcome.into_result() {
            Err(RuntimeError::Crashed { service, .. }) => assert_eq!(service, "B"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_phases_move_forward() {
        let registry = Arc::new(Registry::new());
        registry.register_background(Arc::new(Idle), 1).unwrap();
        let server = Server::builder(registry).build();
        assert_eq!(server.phase(), Phase::Created);

        let mut phases = server.watch_phase();
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };
        phases.wait_for(|p| *p == Phase::Running).await.unwrap();

        server.shutdown("done").await;
        assert_eq!(server.phase(), Phase::Stopped);

        let res = runner.await.unwrap();
        assert!(matches!(res, Err(RuntimeError::Canceled)));
        assert_eq!(server.exit_code(&res), 0);
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let server = Server::builder(Arc::new(Registry::new()))
            .with_config(ServerConfig {
                grace: Duration::from_secs(1),
                ..ServerConfig::default()
            })
            .build();

        assert!(server.request_shutdown("first"));
        assert!(!server.request_shutdown("second"));
        assert_eq!(server.shutdown_reason(), Some("first"));
        assert!(server.is_shutting_down());
        assert_eq!(server.phase(), Phase::Created);
    }

    #[tokio::test]
    async fn test_lost_task_is_reported_by_name() {
        let server = Server::builder(Arc::new(Registry::new())).build();
        let mut set: JoinSet<(Arc<str>, Exit)> = JoinSet::new();
        let handle = set.spawn(std::future::pending());
        let pending = HashMap::from([(handle.id(), Arc::<str>::from("Lost"))]);
        handle.abort();

        match server.join_all(set, pending).await {
            Err(RuntimeError::Crashed { service, .. }) => assert_eq!(service, "Lost"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(server.is_shutting_down());
    }

    #[tokio::test]
    async fn test_finished_task_beats_expired_grace() {
        let server = Server::builder(Arc::new(Registry::new()))
            .with_config(ServerConfig {
                grace: Duration::ZERO,
                ..ServerConfig::default()
            })
            .build();
        server.request_shutdown("stop");

        let mut set: JoinSet<(Arc<str>, Exit)> = JoinSet::new();
        let handle = set.spawn(async {
            (
                Arc::<str>::from("Quick"),
                Exit::Finished(Err(ServiceError::Canceled)),
            )
        });
        let pending = HashMap::from([(handle.id(), Arc::<str>::from("Quick"))]);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        let res = server.join_all(set, pending).await;
        assert!(matches!(res, Err(RuntimeError::Canceled)), "{res:?}");
    }
}
