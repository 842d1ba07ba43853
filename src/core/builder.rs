use std::any::Any;
use std::sync::Arc;

use super::{ServerConfig, server::Server};
use crate::inject::Populator;
use crate::registry::Registry;
use crate::subscribers::Subscribe;

/// Builder for a [`Server`].
pub struct ServerBuilder {
    registry: Arc<Registry>,
    cfg: ServerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    populator: Populator,
}

impl ServerBuilder {
    /// Creates a builder with the default configuration.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            cfg: ServerConfig::default(),
            subscribers: Vec::new(),
            populator: Populator::new(),
        }
    }

    /// Replaces the runtime configuration.
    pub fn with_config(mut self, cfg: ServerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Provides a root singleton to the dependency populator.
    pub fn provide<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        self.populator.provide(value);
        self
    }

    /// Provides a root singleton under an explicit name.
    pub fn provide_named<T: Any + Send + Sync>(
        mut self,
        name: impl Into<Arc<str>>,
        value: Arc<T>,
    ) -> Self {
        self.populator.provide_named(name, value);
        self
    }

    /// Builds the server. No task is spawned until [`Server::run`].
    pub fn build(self) -> Arc<Server> {
        Arc::new(Server::new_internal(
            self.cfg,
            self.registry,
            self.subscribers,
            self.populator,
        ))
    }
}
