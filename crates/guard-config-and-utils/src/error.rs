//! Error types for configuration loading.

use thiserror::Error;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid authority URL '{url}': {source}")]
    InvalidAuthorityUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Convenience Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
