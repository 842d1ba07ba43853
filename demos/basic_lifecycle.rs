//! Minimal lifecycle: an init-only pool, two background services, shutdown after a second.
//!
//! ```text
//! cargo run --example basic_lifecycle
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use svcvisor::components::{Worker, WorkerPool};
use svcvisor::{
    Background, Dependency, Injector, LogWriter, PopulateError, Registry, Server, Service,
    ServiceError, Slot,
};
use tokio_util::sync::CancellationToken;

struct Beat {
    every: Duration,
    pool: Slot<WorkerPool>,
}

struct BeatStatus(Duration);

impl Worker for BeatStatus {
    fn do_work(&self) {}

    fn status(&self) -> String {
        format!("beating every {:?}", self.0)
    }
}

impl Service for Beat {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::of::<WorkerPool>()]
    }

    fn populate(&self, deps: &Injector<'_>) -> Result<(), PopulateError> {
        self.pool.fill(deps.get()?);
        Ok(())
    }

    fn init(&self) -> Result<(), ServiceError> {
        self.pool.get()?.register(Arc::new(BeatStatus(self.every)));
        Ok(())
    }
}

#[async_trait]
impl Background for Beat {
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.every) => println!("beat {:?}", self.every),
                _ = ctx.cancelled() => return Err(ServiceError::Canceled),
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let registry = Arc::new(Registry::new());
    let pool = Arc::new(WorkerPool::new());
    registry.register(Arc::clone(&pool), 99)?;
    for (name, ms) in [("Fast", 200), ("Slow", 450)] {
        let beat = Beat {
            every: Duration::from_millis(ms),
            pool: Slot::new(),
        };
        registry.register_background_as(name, Arc::new(beat), 10)?;
    }

    let server = Server::builder(registry)
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .build();

    let stopper = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            println!("workers: {:?}", pool.status());
            server.shutdown("demo finished").await;
        })
    };

    let result = server.run().await;
    stopper.await?;
    println!("result: {result:?}, exit code: {}", server.exit_code(&result));
    Ok(())
}
