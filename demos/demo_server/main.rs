//! Demo server: shared components, two processors, two workers and a status reporter.
//!
//! ```text
//! cargo run --example demo_server -- --config-dir ./demo-config
//! DEMO_WORKER_A__ENABLED=true DEMO_PROCESSOR_FOO__ENABLED=true cargo run --example demo_server
//! ```
//!
//! SIGINT/SIGTERM/SIGQUIT shut the server down; SIGHUP reloads the settings.

mod processors;
mod status;
mod workers;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use svcvisor::components::{ProcessorController, WorkerPool};
use svcvisor::{LogWriter, Registry, Server, ServerConfig, Settings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::processors::{ProcessorBar, ProcessorFoo};
use crate::status::StatusReporter;
use crate::workers::TickWorker;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// One of trace, debug, info, warn, error
    #[arg(long, default_value = "info", env = "DEMO_LOG_LEVEL")]
    log_level: String,

    /// Directory holding `config.toml` (or `config.ini` with --old-config)
    #[arg(long, value_name = "DIR", default_value = "/etc/demo")]
    config_dir: PathBuf,

    /// Read the legacy ini configuration file
    #[arg(long)]
    old_config: bool,

    /// Prefix of environment overrides (`DEMO_WORKER_A__DATA=...`)
    #[arg(long, default_value = "DEMO")]
    env_prefix: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder().parse_lossy(&cli.log_level))
        .with_target(true)
        .init();

    let settings = match load_settings(&cli) {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            error!(error = %e, "Failed to load settings");
            return ExitCode::FAILURE;
        }
    };
    let cfg = match ServerConfig::from_settings(&settings) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid server settings");
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(Registry::new());
    if let Err(e) = register_services(&registry) {
        error!(error = %e, "Failed to register services");
        return ExitCode::FAILURE;
    }

    let server = Server::builder(registry)
        .with_config(cfg)
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .provide(Arc::clone(&settings))
        .build();

    server.spawn_signal_listener();
    spawn_reload_on_hangup(Arc::clone(&settings));

    info!("Starting demo server");
    let result = server.run().await;
    ExitCode::from(u8::try_from(server.exit_code(&result)).unwrap_or(1))
}

fn load_settings(cli: &Cli) -> Result<Settings, svcvisor::SettingsError> {
    let file = if cli.old_config { "config.ini" } else { "config.toml" };
    let builder = Settings::builder()
        .set_default("server.grace", "60s")
        .set_default("server.bus_capacity", 1024);
    let builder = workers::defaults(processors::defaults(status::defaults(builder)));
    builder
        .add_file(cli.config_dir.join(file), false)
        .with_env_prefix(cli.env_prefix.as_str())
        .build()
}

fn register_services(registry: &Registry) -> Result<(), svcvisor::RegistryError> {
    registry.register(Arc::new(WorkerPool::new()), 99)?;
    registry.register(Arc::new(ProcessorController::new()), 99)?;
    registry.register(Arc::new(ProcessorFoo::default()), 10)?;
    registry.register_background(Arc::new(ProcessorBar::default()), 10)?;
    registry.register_background_as(
        "WorkerA",
        Arc::new(TickWorker::new("workerA", "worker_a")),
        9,
    )?;
    registry.register_background_as(
        "WorkerB",
        Arc::new(TickWorker::new("workerB", "worker_b")),
        9,
    )?;
    registry.register_background(Arc::new(StatusReporter::default()), 5)?;
    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_hangup(settings: Arc<Settings>) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGHUP");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            if let Err(e) = settings.reload() {
                error!(error = %e, "Settings reload failed");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_settings: Arc<Settings>) {}
