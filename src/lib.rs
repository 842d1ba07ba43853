//! # svcvisor
//!
//! **svcvisor** is a small process-lifecycle kernel for Rust services.
//!
//! Independently written services are registered with a priority; the [`Server`]
//! injects their shared collaborators, initializes them one by one in priority order,
//! runs the long-lived ones concurrently, and stops everything together when one of
//! them crashes, a termination signal arrives, or shutdown is requested.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   entry point
//!     ├─ Registry::register*(service, priority)        (append-only until run)
//!     ├─ Server::builder(registry).provide(root)...    (root singletons)
//!     └─ Server::run()
//!            │
//! ┌──────────▼────────────────────────────────────────────────────────┐
//! │  Server                                                           │
//! │  - Registry snapshot (priority desc, ties by registration order)  │
//! │  - Populator (typed dependency resolution and injection)          │
//! │  - CancellationToken (one per run, child per background service)  │
//! │  - shutdown reason, in-progress flag, first-error slot            │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   Service::init      Service::init      Service::init      (sequential)
//!        ▼                                     ▼
//!   Background::run                       Background::run    (concurrent)
//!        │ publishes lifecycle events          │
//!        ▼                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                (capacity: ServerConfig::bus_capacity)             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     LogWriter   sub2      subN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Created ─► Populating ─► Initializing ─► Running ─► ShuttingDown ─► Stopped
//!                │               │                        ▲
//!                │ populate err  │ init err               │ crash / signal / shutdown()
//!                └───────────────┴──────► Stopped         │
//!
//! exit_code: 0 ⇔ (Ok | Canceled) and a shutdown reason was recorded
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Services**      | Init-only and long-running services, optional disabling  | [`Service`], [`Background`]                 |
//! | **Registry**      | Priority-ordered registration                            | [`Registry`], [`Descriptor`], [`Priority`]  |
//! | **Injection**     | Typed dependency declaration and population              | [`Dependency`], [`Injector`], [`Slot`]      |
//! | **Orchestration** | Populate, init, run, bounded shutdown, exit code         | [`Server`], [`Phase`], [`ServerConfig`]     |
//! | **Events**        | Lifecycle events and subscribers                         | [`Event`], [`Subscribe`], [`LogWriter`]     |
//! | **Settings**      | Layered, reloadable application configuration            | [`Settings`]                                |
//! | **Errors**        | Typed errors for every layer                             | [`RuntimeError`], [`ServiceError`]          |
//! | **Components**    | Shared worker roster and processor holder                | [`components`]                              |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use svcvisor::{Registry, Server, Service, ServiceError, Settings};
//!
//! struct Migrations;
//!
//! impl Service for Migrations {
//!     fn init(&self) -> Result<(), ServiceError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let settings = Arc::new(Settings::builder().build().unwrap());
//!
//!     let registry = Arc::new(Registry::new());
//!     registry.register(Arc::new(Migrations), 50).unwrap();
//!
//!     let server = Server::builder(registry).provide(settings).build();
//!     server.request_shutdown("one-shot");
//!
//!     let result = server.run().await;
//!     assert!(result.is_ok());
//!     assert_eq!(server.exit_code(&result), 0);
//! }
//! ```

pub mod components;
mod core;
mod error;
mod events;
mod inject;
mod registry;
mod services;
mod settings;
mod subscribers;

pub use core::{Phase, Server, ServerBuilder, ServerConfig, shutdown};
pub use error::{PopulateError, RegistryError, RuntimeError, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use inject::{Dependency, Injector, Populator, Slot};
pub use registry::{Capability, Descriptor, Priority, Registry};
pub use services::{Background, Service};
pub use settings::{Listener, Settings, SettingsBuilder, SettingsError, parse_duration};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
