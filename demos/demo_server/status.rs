//! Periodic status report of the shared components.

use std::time::Duration;

use async_trait::async_trait;
use svcvisor::components::{ProcessorController, WorkerPool};
use svcvisor::{
    Background, Dependency, Injector, PopulateError, Service, ServiceError, Settings,
    SettingsBuilder, Slot,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn defaults(builder: SettingsBuilder) -> SettingsBuilder {
    builder.set_default("status.interval", "10s")
}

#[derive(Default)]
pub struct StatusReporter {
    settings: Slot<Settings>,
    pool: Slot<WorkerPool>,
    controller: Slot<ProcessorController>,
}

impl StatusReporter {
    fn interval(&self) -> Result<Duration, ServiceError> {
        self.settings
            .get()?
            .get_duration("status.interval")
            .map_err(|e| ServiceError::config("status.interval", e.to_string()))
    }
}

impl Service for StatusReporter {
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
        if self.interval()?.is_zero() {
            return Err(ServiceError::config("status.interval", "must be positive"));
        }
        Ok(())
    }
}

#[async_trait]
impl Background for StatusReporter {
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        let mut ticker = tokio::time::interval(self.interval()?);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let workers = self.pool.get()?.status();
                    let processor = self.controller.get()?.describe();
                    info!(?workers, processor = processor.as_deref().unwrap_or("none"), "Status");
                }
                _ = ctx.cancelled() => return Err(ServiceError::Canceled),
            }
        }
    }
}
