use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use svcvisor::{
    Background, Dependency, Event, EventKind, Injector, Phase, PopulateError, Registry,
    RegistryError, RuntimeError, Server, ServerConfig, Service, ServiceError, Settings, Slot,
    Subscribe,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    /// Waits for cancellation, returns the sentinel.
    WaitCancel,
    /// Fails after the delay unless cancelled first.
    CrashAfter(Duration),
    /// Fails with an error when cancelled.
    FailOnCancel,
    /// Does one unit of work after the delay, then waits for cancellation.
    WorkAfter(Duration),
    /// Ignores cancellation for the given time.
    Stubborn(Duration),
    /// Returns right away.
    Finish,
    Panic,
}

struct Scripted {
    name: &'static str,
    journal: Journal,
    disabled: bool,
    fail_init: bool,
    panic_init: bool,
    behavior: Behavior,
}

impl Scripted {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            disabled: false,
            fail_init: false,
            panic_init: false,
            behavior: Behavior::WaitCancel,
        }
    }

    fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    fn panicking_init(mut self) -> Self {
        self.panic_init = true;
        self
    }

    fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }
}

impl Service for Scripted {
    fn init(&self) -> Result<(), ServiceError> {
        self.journal.push(format!("init:{}", self.name));
        if self.panic_init {
            panic!("{} panicked in init", self.name);
        }
        if self.fail_init {
            return Err(ServiceError::fail(format!("{} refused to start", self.name)));
        }
        Ok(())
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }
}

#[async_trait]
impl Background for Scripted {
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        self.journal.push(format!("run:{}", self.name));
        match self.behavior {
            Behavior::WaitCancel => {
                ctx.cancelled().await;
                self.journal.push(format!("cancelled:{}", self.name));
                Err(ServiceError::Canceled)
            }
            Behavior::CrashAfter(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        Err(ServiceError::fail(format!("{} crashed", self.name)))
                    }
                    _ = ctx.cancelled() => {
                        self.journal.push(format!("cancelled:{}", self.name));
                        Err(ServiceError::Canceled)
                    }
                }
            }
            Behavior::FailOnCancel => {
                ctx.cancelled().await;
                Err(ServiceError::fail(format!("{} failed while stopping", self.name)))
            }
            Behavior::WorkAfter(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        self.journal.push(format!("work:{}", self.name));
                    }
                    _ = ctx.cancelled() => {
                        self.journal.push(format!("cancelled:{}", self.name));
                        return Err(ServiceError::Canceled);
                    }
                }
                ctx.cancelled().await;
                Err(ServiceError::Canceled)
            }
            Behavior::Stubborn(delay) => {
                tokio::time::sleep(delay).await;
                Err(ServiceError::Canceled)
            }
            Behavior::Finish => Ok(()),
            Behavior::Panic => panic!("scripted service panicked"),
        }
    }
}

/// Needs the shared settings and records what it saw in `init`.
#[derive(Default)]
struct Needy {
    settings: Slot<Settings>,
    seen: Mutex<Option<String>>,
}

impl Service for Needy {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::of::<Settings>()]
    }

    fn populate(&self, deps: &Injector<'_>) -> Result<(), PopulateError> {
        self.settings.fill(deps.get()?);
        Ok(())
    }

    fn init(&self) -> Result<(), ServiceError> {
        let greeting = self.settings.get()?.get_string_or("needy.greeting", "none");
        *self.seen.lock() = Some(greeting);
        Ok(())
    }
}

/// Panics while its dependencies are injected.
struct Grabby;

impl Service for Grabby {
    fn populate(&self, _deps: &Injector<'_>) -> Result<(), PopulateError> {
        panic!("grabby panicked in populate");
    }

    fn init(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(EventKind, Option<String>)>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.seen
            .lock()
            .push((ev.kind, ev.service.as_deref().map(str::to_string)));
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn acting(name: &'static str, journal: &Journal, behavior: Behavior) -> Arc<Scripted> {
    Arc::new(Scripted::new(name, journal).behavior(behavior))
}

fn spawn_run(server: &Arc<Server>) -> tokio::task::JoinHandle<Result<(), RuntimeError>> {
    let server = Arc::clone(server);
    tokio::spawn(async move { server.run().await })
}

/// Waits until `n` background services entered their run.
async fn wait_started(rx: &mut broadcast::Receiver<Event>, n: usize) {
    let mut started = 0;
    while started < n {
        match rx.recv().await {
            Ok(ev) if ev.kind == EventKind::ServiceStarting => started += 1,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
        }
    }
}

#[tokio::test]
async fn init_follows_priority_and_skips_disabled() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry.register_as("C", Arc::new(Scripted::new("C", &journal)), 1).unwrap();
    registry.register_as("A", Arc::new(Scripted::new("A", &journal)), 10).unwrap();
    registry
        .register_as("D", Arc::new(Scripted::new("D", &journal).disabled()), 5)
        .unwrap();
    registry.register_as("B", Arc::new(Scripted::new("B", &journal)), 10).unwrap();

    assert_eq!(registry.names(), vec!["A", "B", "D", "C"]);

    let server = Server::builder(registry).build();
    server.request_shutdown("init only");
    let result = server.run().await;

    assert!(result.is_ok());
    assert_eq!(journal.entries(), vec!["init:A", "init:B", "init:C"]);
    assert_eq!(server.exit_code(&result), 0);
}

#[tokio::test]
async fn ok_without_reason_is_not_clean() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as("Done", acting("Done", &journal, Behavior::Finish), 1)
        .unwrap();

    let server = Server::builder(registry).build();
    let result = server.run().await;

    assert!(result.is_ok());
    assert!(journal.contains("run:Done"));
    assert_eq!(server.shutdown_reason(), None);
    assert_eq!(server.exit_code(&result), 1);
}

#[tokio::test]
async fn init_failure_prevents_every_run() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as("A", Arc::new(Scripted::new("A", &journal)), 10)
        .unwrap();
    registry
        .register_as("Bad", Arc::new(Scripted::new("Bad", &journal).failing_init()), 5)
        .unwrap();
    registry.register_as("C", Arc::new(Scripted::new("C", &journal)), 1).unwrap();

    let server = Server::builder(registry).build();
    let result = server.run().await;

    match &result {
        Err(RuntimeError::Init { service, .. }) => assert_eq!(service, "Bad"),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(journal.entries(), vec!["init:A", "init:Bad"]);
    assert_eq!(server.phase(), Phase::Stopped);
    assert_eq!(server.exit_code(&result), 1);
}

#[tokio::test]
async fn crash_cancels_the_others_and_exits_with_failure() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as("A", Arc::new(Scripted::new("A", &journal)), 10)
        .unwrap();
    registry
        .register_background_as(
            "B",
            acting("B", &journal, Behavior::CrashAfter(Duration::from_millis(100))),
            5,
        )
        .unwrap();

    let server = Server::builder(registry).build();
    let started = Instant::now();
    let result = server.run().await;

    assert!(started.elapsed() >= Duration::from_millis(100));
    match &result {
        Err(RuntimeError::Crashed { service, source }) => {
            assert_eq!(service, "B");
            assert_eq!(source.to_string(), "execution failed: B crashed");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(journal.position("init:A") < journal.position("init:B"));
    assert!(journal.contains("run:A"));
    assert!(journal.contains("run:B"));
    assert!(journal.contains("cancelled:A"));
    assert!(server.is_shutting_down());
    assert_eq!(server.exit_code(&result), 1);
}

#[tokio::test]
async fn first_failure_wins() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as(
            "First",
            acting("First", &journal, Behavior::CrashAfter(Duration::from_millis(30))),
            1,
        )
        .unwrap();
    for name in ["Late1", "Late2"] {
        registry
            .register_background_as(name, acting(name, &journal, Behavior::FailOnCancel), 1)
            .unwrap();
    }

    let server = Server::builder(registry).build();
    let result = server.run().await;

    match result {
        Err(RuntimeError::Crashed { service, .. }) => assert_eq!(service, "First"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn panicking_service_is_a_crash() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as("Boom", acting("Boom", &journal, Behavior::Panic), 1)
        .unwrap();
    registry
        .register_background_as("Calm", Arc::new(Scripted::new("Calm", &journal)), 1)
        .unwrap();

    let server = Server::builder(registry).build();
    let result = server.run().await;

    match &result {
        Err(RuntimeError::Crashed {
            service,
            source: ServiceError::Panicked { info },
        }) => {
            assert_eq!(service, "Boom");
            assert_eq!(info, "scripted service panicked");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(server.exit_code(&result), 1);
}

#[tokio::test]
async fn concurrent_double_shutdown_records_one_reason() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as("A", Arc::new(Scripted::new("A", &journal)), 1)
        .unwrap();

    let server = Server::builder(registry).build();
    let mut rx = server.bus().subscribe();
    let runner = spawn_run(&server);
    wait_started(&mut rx, 1).await;

    let first = Arc::clone(&server);
    let second = Arc::clone(&server);
    tokio::join!(first.shutdown("one"), second.shutdown("two"));

    let reason = server.shutdown_reason().map(str::to_string);
    assert!(matches!(reason.as_deref(), Some("one") | Some("two")));
    assert_eq!(server.phase(), Phase::Stopped);

    let result = runner.await.unwrap();
    assert!(matches!(result, Err(RuntimeError::Canceled)));
    assert_eq!(server.exit_code(&result), 0);
    assert_eq!(server.shutdown_reason().map(str::to_string), reason);
}

#[tokio::test]
async fn immediate_shutdown_stops_before_any_work() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as(
            "Ticker",
            acting("Ticker", &journal, Behavior::WorkAfter(Duration::from_millis(500))),
            1,
        )
        .unwrap();

    let server = Server::builder(registry).build();
    let runner = spawn_run(&server);
    server.shutdown("test").await;

    let result = runner.await.unwrap();
    assert!(matches!(result, Err(RuntimeError::Canceled)));
    assert!(!journal.contains("work:Ticker"));
    assert_eq!(server.shutdown_reason(), Some("test"));
    assert_eq!(server.exit_code(&result), 0);
}

#[tokio::test]
async fn shutdown_before_run_skips_background_services() {
    let journal = Journal::default();
    let recorder = Arc::new(Recorder::default());
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as("A", Arc::new(Scripted::new("A", &journal)), 1)
        .unwrap();

    let server = Server::builder(registry)
        .with_subscribers(vec![recorder.clone()])
        .build();
    server.shutdown("early").await;
    assert_eq!(server.phase(), Phase::Created);

    let result = server.run().await;
    assert!(matches!(result, Err(RuntimeError::Canceled)));
    assert_eq!(journal.entries(), vec!["init:A"]);
    assert!(
        recorder
            .seen
            .lock()
            .contains(&(EventKind::ServiceSkipped, Some("A".to_string())))
    );
    assert_eq!(server.exit_code(&result), 0);
}

#[tokio::test]
async fn disabled_service_with_faulty_init_is_never_initialized() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as(
            "Broken",
            Arc::new(Scripted::new("Broken", &journal).disabled().failing_init()),
            1,
        )
        .unwrap();

    let server = Server::builder(registry).build();
    let result = server.run().await;

    assert!(result.is_ok());
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn populate_failure_prevents_init() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry.register_as("A", Arc::new(Scripted::new("A", &journal)), 10).unwrap();
    registry.register(Arc::new(Needy::default()), 1).unwrap();

    let server = Server::builder(registry).build();
    let result = server.run().await;

    match &result {
        Err(RuntimeError::Populate(PopulateError::Unresolved { service, .. })) => {
            assert_eq!(service, "Needy")
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(journal.entries().is_empty());
    assert_eq!(server.phase(), Phase::Stopped);
}

#[tokio::test]
async fn provided_settings_reach_services() {
    let settings = Arc::new(
        Settings::builder()
            .set_default("needy.greeting", "hello")
            .build()
            .unwrap(),
    );
    let needy = Arc::new(Needy::default());
    let registry = Arc::new(Registry::new());
    registry.register(Arc::clone(&needy), 1).unwrap();

    let server = Server::builder(registry).provide(settings).build();
    server.run().await.unwrap();

    assert_eq!(needy.seen.lock().as_deref(), Some("hello"));
}

#[tokio::test]
async fn registry_is_sealed_once_run_starts() {
    let registry = Arc::new(Registry::new());
    let server = Server::builder(Arc::clone(&registry)).build();
    server.run().await.unwrap();

    let journal = Journal::default();
    let err = registry
        .register_as("Late", Arc::new(Scripted::new("Late", &journal)), 1)
        .unwrap_err();
    assert_eq!(err, RegistryError::Sealed { name: "Late".into() });
}

#[tokio::test]
async fn run_twice_is_rejected() {
    let server = Server::builder(Arc::new(Registry::new())).build();
    server.run().await.unwrap();
    assert!(matches!(server.run().await, Err(RuntimeError::AlreadyStarted)));
}

#[tokio::test]
async fn grace_exceeded_reports_stuck_services() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_background_as("Polite", Arc::new(Scripted::new("Polite", &journal)), 2)
        .unwrap();
    registry
        .register_background_as(
            "Stubborn",
            acting("Stubborn", &journal, Behavior::Stubborn(Duration::from_secs(5))),
            1,
        )
        .unwrap();

    let server = Server::builder(registry)
        .with_config(ServerConfig {
            grace: Duration::from_millis(50),
            ..ServerConfig::default()
        })
        .build();
    let mut rx = server.bus().subscribe();
    let runner = spawn_run(&server);
    wait_started(&mut rx, 2).await;

    let started = Instant::now();
    server.shutdown("deploy").await;
    assert!(started.elapsed() < Duration::from_secs(5));

    let result = runner.await.unwrap();
    match &result {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(*grace, Duration::from_millis(50));
            assert_eq!(stuck, &vec!["Stubborn".to_string()]);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(journal.contains("cancelled:Polite"));
    assert_eq!(server.exit_code(&result), 1);
}

#[tokio::test]
async fn subscribers_see_the_whole_lifecycle() {
    let journal = Journal::default();
    let recorder = Arc::new(Recorder::default());
    let registry = Arc::new(Registry::new());
    registry.register_as("Init", Arc::new(Scripted::new("Init", &journal)), 3).unwrap();
    registry
        .register_as("Off", Arc::new(Scripted::new("Off", &journal).disabled()), 2)
        .unwrap();
    registry
        .register_background_as("Done", acting("Done", &journal, Behavior::Finish), 1)
        .unwrap();

    let server = Server::builder(registry)
        .with_subscribers(vec![recorder.clone()])
        .build();
    server.run().await.unwrap();

    let seen = recorder.seen.lock().clone();
    let kinds: Vec<EventKind> = seen.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::DependenciesPopulated,
            EventKind::ServiceInitializing,
            EventKind::ServiceDisabled,
            EventKind::ServiceInitializing,
            EventKind::ServiceStarting,
            EventKind::ServiceStopped,
        ]
    );
    assert_eq!(seen[2].1.as_deref(), Some("Off"));
    assert_eq!(seen[5].1.as_deref(), Some("Done"));
}

#[tokio::test]
async fn panicking_init_fails_the_run_and_stops() {
    let journal = Journal::default();
    let registry = Arc::new(Registry::new());
    registry
        .register_as("Boom", Arc::new(Scripted::new("Boom", &journal).panicking_init()), 10)
        .unwrap();
    registry
        .register_background_as("Later", Arc::new(Scripted::new("Later", &journal)), 1)
        .unwrap();

    let server = Server::builder(registry).build();
    let result = server.run().await;

    match &result {
        Err(RuntimeError::Init { service, source }) => {
            assert_eq!(service, "Boom");
            assert!(matches!(source, ServiceError::Panicked { .. }), "{source:?}");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!journal.contains("init:Later"));
    assert_eq!(server.phase(), Phase::Stopped);
    assert_eq!(server.exit_code(&result), 1);

    tokio::time::timeout(Duration::from_secs(2), server.shutdown("after init panic"))
        .await
        .expect("shutdown must not wait on a dead run");
}

#[tokio::test]
async fn panicking_populate_still_reaches_stopped() {
    let registry = Arc::new(Registry::new());
    registry.register(Arc::new(Grabby), 10).unwrap();

    let server = Server::builder(registry).build();
    let joined = spawn_run(&server).await;

    assert!(joined.is_err_and(|e| e.is_panic()));
    assert_eq!(server.phase(), Phase::Stopped);

    tokio::time::timeout(Duration::from_secs(2), server.shutdown("after populate panic"))
        .await
        .expect("shutdown must not wait on a dead run");
}
