//! Configuration for the Mountguard client.
//!
//! Defaults match the recommended cadences; every field can be overridden
//! through `MOUNTGUARD_*` environment variables so deployments never embed
//! settings in the binary.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

/// Default authority base URL.
pub const DEFAULT_AUTHORITY_URL: &str = "http://127.0.0.1:5000";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3;

/// Default liveness probe cadence in milliseconds.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 2_000;

/// Default device poll cadence in milliseconds.
pub const DEFAULT_DEVICE_POLL_INTERVAL_MS: u64 = 500;

/// Default event poll cadence in milliseconds.
pub const DEFAULT_EVENT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default fast change-detection cadence in milliseconds.
pub const DEFAULT_REALTIME_POLL_INTERVAL_MS: u64 = 250;

/// Default retained event window.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 150;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the remote authority.
    #[serde(default = "default_authority_url")]
    pub authority_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_device_poll_interval_ms")]
    pub device_poll_interval_ms: u64,
    #[serde(default = "default_event_poll_interval_ms")]
    pub event_poll_interval_ms: u64,
    #[serde(default = "default_realtime_poll_interval_ms")]
    pub realtime_poll_interval_ms: u64,
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_authority_url() -> String {
    DEFAULT_AUTHORITY_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_probe_interval_ms() -> u64 {
    DEFAULT_PROBE_INTERVAL_MS
}

fn default_device_poll_interval_ms() -> u64 {
    DEFAULT_DEVICE_POLL_INTERVAL_MS
}

fn default_event_poll_interval_ms() -> u64 {
    DEFAULT_EVENT_POLL_INTERVAL_MS
}

fn default_realtime_poll_interval_ms() -> u64 {
    DEFAULT_REALTIME_POLL_INTERVAL_MS
}

fn default_event_log_capacity() -> usize {
    DEFAULT_EVENT_LOG_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            authority_url: default_authority_url(),
            request_timeout_secs: default_request_timeout_secs(),
            probe_interval_ms: default_probe_interval_ms(),
            device_poll_interval_ms: default_device_poll_interval_ms(),
            event_poll_interval_ms: default_event_poll_interval_ms(),
            realtime_poll_interval_ms: default_realtime_poll_interval_ms(),
            event_log_capacity: default_event_log_capacity(),
        }
    }
}

impl Config {
    /// Defaults overridden by environment variables.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Apply `MOUNTGUARD_*` environment overrides in place.
    ///
    /// Unparseable values are logged and skipped rather than failing the
    /// whole startup.
    pub fn load_from_env(&mut self) {
        if let Some(value) = env_var("MOUNTGUARD_LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = env_var("MOUNTGUARD_AUTHORITY_URL") {
            self.authority_url = value;
        }
        apply_u64(
            "MOUNTGUARD_REQUEST_TIMEOUT_SECS",
            &mut self.request_timeout_secs,
        );
        apply_u64("MOUNTGUARD_PROBE_INTERVAL_MS", &mut self.probe_interval_ms);
        apply_u64(
            "MOUNTGUARD_DEVICE_POLL_INTERVAL_MS",
            &mut self.device_poll_interval_ms,
        );
        apply_u64(
            "MOUNTGUARD_EVENT_POLL_INTERVAL_MS",
            &mut self.event_poll_interval_ms,
        );
        apply_u64(
            "MOUNTGUARD_REALTIME_POLL_INTERVAL_MS",
            &mut self.realtime_poll_interval_ms,
        );
        if let Some(value) = env_var("MOUNTGUARD_EVENT_LOG_CAPACITY") {
            match value.parse::<usize>() {
                Ok(parsed) if parsed > 0 => self.event_log_capacity = parsed,
                _ => warn!(value = %value, "Ignoring invalid MOUNTGUARD_EVENT_LOG_CAPACITY"),
            }
        }
    }

    /// Validate the fields that cannot be checked at parse time.
    pub fn validate(&self) -> ConfigResult<()> {
        Url::parse(&self.authority_url).map_err(|source| ConfigError::InvalidAuthorityUrl {
            url: self.authority_url.clone(),
            source,
        })?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "request_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn apply_u64(name: &str, target: &mut u64) {
    if let Some(value) = env_var(name) {
        match value.parse::<u64>() {
            Ok(parsed) if parsed > 0 => *target = parsed,
            _ => warn!(variable = name, value = %value, "Ignoring invalid override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_authority() {
        let config = Config::default();
        assert_eq!(config.authority_url, DEFAULT_AUTHORITY_URL);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.probe_interval_ms, 2_000);
        assert_eq!(config.device_poll_interval_ms, 500);
        assert_eq!(config.event_poll_interval_ms, 1_000);
        assert_eq!(config.realtime_poll_interval_ms, 250);
        assert_eq!(config.event_log_capacity, 150);
    }

    #[test]
    fn default_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn invalid_url_fails_validation() {
        let config = Config {
            authority_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAuthorityUrl { .. })
        ));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn deserializes_sparse_config() {
        let config: Config = serde_json::from_str(r#"{"log_level":"debug"}"#).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.authority_url, DEFAULT_AUTHORITY_URL);
    }
}
