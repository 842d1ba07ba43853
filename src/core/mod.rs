//! Runtime core: orchestration and lifecycle.
//!
//! The public API of this module is [`Server`] (built with [`ServerBuilder`]), its
//! [`Phase`], the [`ServerConfig`] knobs, and the [`shutdown`] signal helper.
//!
//! Internal modules:
//! - [`server`]: populate, sequential init, concurrent run, bounded shutdown;
//! - [`builder`]: wires configuration, subscribers and root singletons;
//! - [`config`]: runtime configuration;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod config;
mod server;
pub mod shutdown;

pub use builder::ServerBuilder;
pub use config::ServerConfig;
pub use server::{Phase, Server};
