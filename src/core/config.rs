//! # Runtime configuration.
//!
//! [`ServerConfig`] carries the knobs of the orchestration runtime itself. Application
//! settings live in [`Settings`](crate::Settings); a config can be read from them with
//! [`ServerConfig::from_settings`].
//!
//! ## Keys
//! - `server.grace`: duration string (`"30s"`, `"500ms"`)
//! - `server.bus_capacity`: integer, at least 1

use std::time::Duration;

use crate::settings::{Settings, SettingsError};

/// Configuration of a [`Server`](crate::Server).
///
/// ## Field semantics
/// - `grace`: maximum wait for background services to stop once shutdown began
///   (`0s` = give up waiting immediately)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Maximum time to wait for running services after cancellation.
    ///
    /// When it expires the remaining services are left behind and the run ends with
    /// `RuntimeError::GraceExceeded` unless an error was already recorded.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl ServerConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Reads `server.*` keys, keeping defaults for missing ones.
    ///
    /// Present but malformed values are errors.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        let mut cfg = Self::default();
        match settings.get_duration("server.grace") {
            Ok(grace) => cfg.grace = grace,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match settings.get_int("server.bus_capacity") {
            Ok(n) => {
                cfg.bus_capacity = usize::try_from(n).map_err(|_| {
                    SettingsError::Config(::config::ConfigError::Message(format!(
                        "server.bus_capacity must be positive, got {n}"
                    )))
                })?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        Ok(cfg)
    }
}

impl Default for ServerConfig {
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_keep_defaults() {
        let settings = Settings::builder().build().unwrap();
        let cfg = ServerConfig::from_settings(&settings).unwrap();
        assert_eq!(cfg.grace, Duration::from_secs(60));
        assert_eq!(cfg.bus_capacity, 1024);
    }

    #[test]
    fn test_reads_server_keys() {
        let settings = Settings::builder()
            .set_default("server.grace", "250ms")
            .set_default("server.bus_capacity", 0)
            .build()
            .unwrap();
        let cfg = ServerConfig::from_settings(&settings).unwrap();
        assert_eq!(cfg.grace, Duration::from_millis(250));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_malformed_values_rejected() {
        let settings = Settings::builder()
            .set_default("server.grace", "later")
            .build()
            .unwrap();
        assert!(ServerConfig::from_settings(&settings).is_err());

        let settings = Settings::builder()
            .set_default("server.bus_capacity", -4)
            .build()
            .unwrap();
        assert!(ServerConfig::from_settings(&settings).is_err());
    }
}
