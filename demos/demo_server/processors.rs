//! Sample processors. Only one of them may be enabled at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use svcvisor::components::{Processor, ProcessorController};
use svcvisor::{
    Background, Dependency, Injector, PopulateError, Service, ServiceError, Settings,
    SettingsBuilder, Slot,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub fn defaults(builder: SettingsBuilder) -> SettingsBuilder {
    builder
        .set_default("processor_foo.enabled", false)
        .set_default("processor_foo.data", "ProcessorFoo")
        .set_default("processor_bar.enabled", false)
        .set_default("processor_bar.data", "ProcessorBar")
        .set_default("processor_bar.startup", "30s")
}

/// What the controller hands out: the processor's data and its readiness latch.
struct Handle {
    data: RwLock<String>,
    ready: watch::Sender<bool>,
}

impl Default for Handle {
    fn default() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            data: RwLock::new(String::new()),
            ready,
        }
    }
}

impl Handle {
    fn mark_ready(&self) {
        self.ready.send_replace(true);
    }
}

#[async_trait]
impl Processor for Handle {
    fn data(&self) -> String {
        self.data.read().clone()
    }

    async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

fn dependencies() -> Vec<Dependency> {
    vec![
        Dependency::of::<Settings>(),
        Dependency::of::<ProcessorController>(),
    ]
}

/// Ready as soon as it is initialized.
#[derive(Default)]
pub struct ProcessorFoo {
    settings: Slot<Settings>,
    controller: Slot<ProcessorController>,
    handle: Arc<Handle>,
}

impl Service for ProcessorFoo {
    fn dependencies(&self) -> Vec<Dependency> {
        dependencies()
    }

    fn populate(&self, deps: &Injector<'_>) -> Result<(), PopulateError> {
        self.settings.fill(deps.get()?);
        self.controller.fill(deps.get()?);
        Ok(())
    }

    fn init(&self) -> Result<(), ServiceError> {
        debug!("Initializing ProcessorFoo");
        *self.handle.data.write() = self.settings.get()?.get_string_or("processor_foo.data", "");
        self.controller.get()?.set(self.handle.clone())?;
        self.handle.mark_ready();
        Ok(())
    }

    fn is_disabled(&self) -> bool {
        self.settings
            .get()
            .map(|s| !s.get_bool_or("processor_foo.enabled", false))
            .unwrap_or(true)
    }
}

/// Becomes ready after a simulated startup delay.
#[derive(Default)]
pub struct ProcessorBar {
    settings: Slot<Settings>,
    controller: Slot<ProcessorController>,
    handle: Arc<Handle>,
}

impl Service for ProcessorBar {
    fn dependencies(&self) -> Vec<Dependency> {
        dependencies()
    }

    fn populate(&self, deps: &Injector<'_>) -> Result<(), PopulateError> {
        self.settings.fill(deps.get()?);
        self.controller.fill(deps.get()?);
        Ok(())
    }

    fn init(&self) -> Result<(), ServiceError> {
        debug!("Initializing ProcessorBar");
        let settings = self.settings.get()?;
        settings
            .get_duration("processor_bar.startup")
            .map_err(|e| ServiceError::config("processor_bar.startup", e.to_string()))?;
        *self.handle.data.write() = settings.get_string_or("processor_bar.data", "");
        self.controller.get()?.set(self.handle.clone())
    }

    fn is_disabled(&self) -> bool {
        self.settings
            .get()
            .map(|s| !s.get_bool_or("processor_bar.enabled", false))
            .unwrap_or(true)
    }
}

#[async_trait]
impl Background for ProcessorBar {
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        let startup = self
            .settings
            .get()?
            .get_duration_or("processor_bar.startup", Duration::from_secs(30));
        tokio::select! {
            _ = tokio::time::sleep(startup) => self.handle.mark_ready(),
            _ = ctx.cancelled() => return Err(ServiceError::Canceled),
        }
        ctx.cancelled().await;
        Err(ServiceError::Canceled)
    }
}
