//! Sample ticking workers. One type, registered once per settings section.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use svcvisor::components::{ProcessorController, Worker, WorkerPool};
use svcvisor::{
    Background, Dependency, Injector, PopulateError, Service, ServiceError, Settings,
    SettingsBuilder, Slot,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub fn defaults(builder: SettingsBuilder) -> SettingsBuilder {
    builder
        .set_default("worker_a.enabled", false)
        .set_default("worker_a.data", "workerA")
        .set_default("worker_a.interval", "5s")
        .set_default("worker_b.enabled", false)
        .set_default("worker_b.data", "workerB")
        .set_default("worker_b.interval", "5s")
}

/// The roster entry a [`TickWorker`] registers with the pool.
struct Entry {
    label: &'static str,
    data: parking_lot::RwLock<String>,
}

impl Worker for Entry {
    fn do_work(&self) {
        info!(worker = self.label, data = %self.data.read(), "tick");
    }

    fn status(&self) -> String {
        format!("{} running", self.label)
    }
}

pub struct TickWorker {
    section: &'static str,
    settings: Slot<Settings>,
    pool: Slot<WorkerPool>,
    controller: Slot<ProcessorController>,
    entry: Arc<Entry>,
    interval_ms: Arc<AtomicU64>,
}

impl TickWorker {
    pub fn new(label: &'static str, section: &'static str) -> Self {
        Self {
            section,
            settings: Slot::new(),
            pool: Slot::new(),
            controller: Slot::new(),
            entry: Arc::new(Entry {
                label,
                data: parking_lot::RwLock::new(String::new()),
            }),
            interval_ms: Arc::new(AtomicU64::new(5_000)),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}.{name}", self.section)
    }
}

fn store_interval(slot: &AtomicU64, interval: Duration) {
    let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
    slot.store(ms, Ordering::Relaxed);
}

impl Service for TickWorker {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::of::<Settings>(),
            Dependency::of::<WorkerPool>(),
            Dependency::of::<ProcessorController>(),
        ]
    }

    fn populate(&self, deps: &Injector<'_>) -> Result<(), PopulateError> {
        self.settings.fill(deps.get()?);
        self.pool.fill(deps.get()?);
        self.controller.fill(deps.get()?);
        Ok(())
    }

    fn init(&self) -> Result<(), ServiceError> {
        debug!(worker = self.entry.label, "Initializing worker");
        let settings = self.settings.get()?;

        let data_key = self.key("data");
        let data = settings.get_string_or(&data_key, "");
        if data.is_empty() {
            return Err(ServiceError::config(data_key, "is not set"));
        }
        *self.entry.data.write() = data;

        let interval_key = self.key("interval");
        let interval = settings
            .get_duration(&interval_key)
            .map_err(|e| ServiceError::config(interval_key.clone(), e.to_string()))?;
        store_interval(&self.interval_ms, interval);

        let slot = Arc::clone(&self.interval_ms);
        let label = self.entry.label;
        settings.on_change(move |fresh| {
            if let Ok(interval) = fresh.get_duration(&interval_key) {
                store_interval(&slot, interval);
                info!(worker = label, ?interval, "Interval updated");
            }
        });

        self.pool.get()?.register(self.entry.clone());
        Ok(())
    }

    fn is_disabled(&self) -> bool {
        self.settings
            .get()
            .map(|s| !s.get_bool_or(&self.key("enabled"), false))
            .unwrap_or(true)
    }
}

#[async_trait]
impl Background for TickWorker {
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        let label = self.entry.label;
        let processor = self
            .controller
            .get()?
            .get()
            .ok_or_else(|| ServiceError::fail("no processor is enabled"))?;

        info!(worker = label, "Waiting for processor to be ready");
        tokio::select! {
            _ = processor.ready() => info!(worker = label, "Processor ready, starting"),
            _ = ctx.cancelled() => {
                info!(worker = label, "Shutting down");
                return Err(ServiceError::Canceled);
            }
        }

        loop {
            let interval = Duration::from_millis(self.interval_ms.load(Ordering::Relaxed));
            tokio::select! {
                _ = tokio::time::sleep(interval) => self.entry.do_work(),
                _ = ctx.cancelled() => {
                    info!(worker = label, "Shutting down");
                    return Err(ServiceError::Canceled);
                }
            }
        }
    }
}
