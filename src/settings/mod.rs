//! # Application settings.
//!
//! [`Settings`] is the shared configuration object handed to services by the populator.
//! It layers, in increasing precedence:
//! 1. defaults ([`SettingsBuilder::set_default`])
//! 2. config files (toml / ini, format chosen by extension)
//! 3. environment variables: `PREFIX_SECTION__KEY` → `section.key`
//! 4. overrides ([`SettingsBuilder::set_override`], [`Settings::set_override`])
//!
//! Lookups are typed and use dotted keys (`"worker_a.interval"`).
//!
//! ## Change notification
//! [`Settings::reload`] rebuilds from the same sources, swaps the snapshot and hands a
//! handle to every [`Settings::on_change`] listener on its own task, so a slow listener
//! never blocks the reloader. Listeners should apply what they read atomically
//! (e.g. store into an atomic the service's main loop reads).
//!
//! ```rust
//! use svcvisor::Settings;
//!
//! let settings = Settings::builder()
//!     .set_default("worker_a.enabled", false)
//!     .set_default("worker_a.interval", "5s")
//!     .build()
//!     .unwrap();
//!
//! assert!(!settings.get_bool("worker_a.enabled").unwrap());
//! assert_eq!(settings.get_duration("worker_a.interval").unwrap().as_secs(), 5);
//! assert_eq!(settings.get_string_or("api.listen", ":8080"), ":8080");
//! ```

mod duration;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use config::{Config, Environment, File, Value};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

pub use duration::parse_duration;

/// Settings failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Loading or a typed lookup failed.
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// A duration value could not be parsed.
    #[error("invalid duration {value:?}")]
    InvalidDuration {
        /// The raw value.
        value: String,
    },
}

impl SettingsError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SettingsError::Config(_) => "settings_config",
            SettingsError::InvalidDuration { .. } => "settings_invalid_duration",
        }
    }

    /// True if the looked-up key does not exist in any source.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SettingsError::Config(config::ConfigError::NotFound(_)))
    }
}

/// Callback invoked after a reload.
pub type Listener = Arc<dyn Fn(Arc<Settings>) + Send + Sync>;

#[derive(Clone, Default)]
struct Sources {
    defaults: Vec<(String, Value)>,
    files: Vec<(PathBuf, bool)>,
    env_prefix: Option<String>,
    overrides: Vec<(String, Value)>,
}

impl Sources {
    fn load(&self) -> Result<Config, SettingsError> {
        let mut builder = Config::builder();
        for (key, value) in &self.defaults {
            builder = builder.set_default(key.as_str(), value.clone())?;
        }
        for (path, required) in &self.files {
            builder = builder.add_source(File::from(path.as_path()).required(*required));
        }
        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }
        for (key, value) in &self.overrides {
            builder = builder.set_override(key.as_str(), value.clone())?;
        }
        Ok(builder.build()?)
    }
}

/// Builder for [`Settings`].
#[derive(Default)]
pub struct SettingsBuilder {
    sources: Sources,
}

impl SettingsBuilder {
    /// Sets a default for `key`.
    pub fn set_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sources.defaults.push((key.into(), value.into()));
        self
    }

    /// Forces `key` regardless of files and environment.
    pub fn set_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sources.overrides.push((key.into(), value.into()));
        self
    }

    /// Adds a config file; the extension picks the format. Without extension every
    /// supported one is tried.
    pub fn add_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.sources
            .files
            .push((path.as_ref().to_path_buf(), required));
        self
    }

    /// Reads `PREFIX_SECTION__KEY` environment variables as `section.key`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sources.env_prefix = Some(prefix.into());
        self
    }

    /// Loads every source.
    pub fn build(self) -> Result<Settings, SettingsError> {
        let current = self.sources.load()?;
        Ok(Settings {
            sources: Mutex::new(self.sources),
            current: RwLock::new(current),
            listeners: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
        })
    }
}

/// Shared, reloadable configuration.
pub struct Settings {
    sources: Mutex<Sources>,
    current: RwLock<Config>,
    listeners: Mutex<Vec<Listener>>,
    generation: AtomicU64,
}

impl Settings {
    /// Starts a builder.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// String value of `key`.
    pub fn get_string(&self, key: &str) -> Result<String, SettingsError> {
        Ok(self.current.read().get_string(key)?)
    }

    /// Boolean value of `key`.
    pub fn get_bool(&self, key: &str) -> Result<bool, SettingsError> {
        Ok(self.current.read().get_bool(key)?)
    }

    /// Integer value of `key`.
    pub fn get_int(&self, key: &str) -> Result<i64, SettingsError> {
        Ok(self.current.read().get_int(key)?)
    }

    /// Duration value of `key`, see [`parse_duration`].
    pub fn get_duration(&self, key: &str) -> Result<Duration, SettingsError> {
        parse_duration(&self.get_string(key)?)
    }

    /// String value of `key`, or `default` if missing or invalid.
    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Boolean value of `key`, or `default` if missing or invalid.
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Duration value of `key`, or `default` if missing or invalid.
    pub fn get_duration_or(&self, key: &str, default: Duration) -> Duration {
        self.get_duration(key).unwrap_or(default)
    }

    /// Records an override; it takes effect on the next [`reload`](Settings::reload).
    pub fn set_override(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.sources.lock().overrides.push((key.into(), value.into()));
    }

    /// Number of successful reloads so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Registers a listener called after every successful reload.
    pub fn on_change(&self, listener: impl Fn(Arc<Settings>) + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Rebuilds from all sources and notifies listeners.
    ///
    /// On error the previous snapshot stays in place and nobody is notified.
    pub fn reload(self: &Arc<Self>) -> Result<(), SettingsError> {
        let sources = self.sources.lock().clone();
        let fresh = sources.load()?;
        *self.current.write() = fresh;
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::info!(generation = self.generation(), "Settings reloaded");
        self.notify();
        Ok(())
    }

    fn notify(self: &Arc<Self>) {
        let listeners: Vec<Listener> = self.listeners.lock().clone();
        let runtime = tokio::runtime::Handle::try_current().ok();
        for listener in listeners {
            let me = Arc::clone(self);
            match &runtime {
                Some(rt) => {
                    rt.spawn(async move { listener(me) });
                }
                None => listener(me),
            }
        }
    }
}
