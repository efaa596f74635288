//! Error types for authority requests.

use thiserror::Error;

/// Errors from a single authority request.
///
/// The caller-facing taxonomy is deliberately small: a request either reached
/// the authority and was rejected ([`AuthorityError::Status`]) or it did not
/// get a usable answer at all ([`AuthorityError::Unavailable`]). Timeouts are
/// transport failures and fold into `Unavailable`.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Network, TLS, or timeout failure from reqwest.
    #[error("authority unreachable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The authority answered with a non-success HTTP status.
    #[error("authority error: {status} - {message}")]
    Status {
        /// The HTTP status code returned by the authority.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// A payload could not be serialized or deserialized.
    #[error("payload error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result alias for authority operations.
pub type AuthorityResult<T> = Result<T, AuthorityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = AuthorityError::Status {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(format!("{}", err), "authority error: 503 - maintenance");
    }

    #[test]
    fn json_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{{{").unwrap_err();
        let err: AuthorityError = serde_err.into();
        assert!(format!("{}", err).starts_with("payload error:"));
    }
}
