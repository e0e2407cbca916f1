//! Error types shared by every model adapter.

use thiserror::Error;

/// Errors returned by a hosted model endpoint.
///
/// [`Timeout`](ModelError::Timeout) and [`RateLimited`](ModelError::RateLimited)
/// are transient and may succeed on retry. Every other variant is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The request did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// The endpoint rejected the request because of rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The requested model or route does not exist.
    #[error("model not found: {0}")]
    NotFound(String),

    /// Credentials were missing or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response from the endpoint.
    #[error("API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail extracted from the response body.
        message: String,
    },

    /// The request could not be sent (connection refused, DNS, TLS...).
    #[error("request failed: {0}")]
    Request(String),

    /// The endpoint answered with a body we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The client or request was misconfigured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Map an HTTP status and error detail onto the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            408 => Self::Timeout,
            429 => Self::RateLimited(message),
            _ => Self::Api { status, message },
        }
    }
}

/// Classifies an error as worth retrying or not.
pub trait Retryable {
    /// Return `true` when a later attempt may succeed.
    fn is_transient(&self) -> bool;
}

impl Retryable for ModelError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited(_))
    }
}

/// A convenience result type for model calls.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_variants() {
        assert_eq!(ModelError::from_status(401, "bad key"), ModelError::Unauthorized("bad key".into()));
        assert_eq!(ModelError::from_status(404, "gone"), ModelError::NotFound("gone".into()));
        assert_eq!(ModelError::from_status(408, "slow"), ModelError::Timeout);
        assert_eq!(ModelError::from_status(429, "slow down"), ModelError::RateLimited("slow down".into()));
        assert_eq!(
            ModelError::from_status(500, "boom"),
            ModelError::Api { status: 500, message: "boom".into() }
        );
    }

    #[test]
    fn only_timeouts_and_rate_limits_are_transient() {
        assert!(ModelError::Timeout.is_transient());
        assert!(ModelError::RateLimited("x".into()).is_transient());
        assert!(!ModelError::NotFound("x".into()).is_transient());
        assert!(!ModelError::Unauthorized("x".into()).is_transient());
        assert!(!ModelError::Api { status: 503, message: "x".into() }.is_transient());
        assert!(!ModelError::Request("x".into()).is_transient());
    }
}
