//! Configuration and logging setup for Mountguard.

mod config;
mod error;
pub mod logging;

pub use config::{
    Config, DEFAULT_AUTHORITY_URL, DEFAULT_DEVICE_POLL_INTERVAL_MS, DEFAULT_EVENT_LOG_CAPACITY,
    DEFAULT_EVENT_POLL_INTERVAL_MS, DEFAULT_LOG_LEVEL, DEFAULT_PROBE_INTERVAL_MS,
    DEFAULT_REALTIME_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{ConfigError, ConfigResult};
