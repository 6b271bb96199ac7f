//! Error types for courier.
//!
//! An [`Error`] means the caller did not get a usable answer: the transport
//! failed, retries ran out, a pre-retry hook aborted, or a body the caller
//! asked for could not be built or decoded. A reply with a 4xx/5xx status is
//! not an [`Error`]; it is a [`Response`](crate::Response) whose
//! [`is_error`](crate::Response::is_error) is `true`.

use derive_more::{Display, Error, From};

use crate::Method;

/// Main error type for courier operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// A single attempt exceeded its timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The caller cancelled the request while it was in flight.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,

    /// Every allowed attempt was made and the last one was still retryable.
    #[display("{method} request giving up after {attempts} attempt(s)")]
    #[from(skip)]
    RetriesExhausted {
        /// Method of the abandoned request.
        method: Method,
        /// Number of attempts made.
        attempts: u32,
        /// Status of the last reply, if the last attempt got one.
        last_status: Option<u16>,
        /// Rendered transport error of the last attempt, if it failed.
        last_error: Option<String>,
    },

    /// A pre-retry hook refused to prepare the next attempt.
    #[display("pre-retry hook failed: {_0}")]
    #[from(skip)]
    Hook(#[error(not(source))] String),

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// The response body was already read or discarded.
    #[display("response body already consumed or discarded")]
    #[from(skip)]
    BodyConsumed,
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a pre-retry hook error.
    #[must_use]
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` for failures where another attempt may get a reply.
    #[must_use]
    pub const fn is_retryable_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }

    /// Number of attempts made, if retries were exhausted.
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::Timeout;
        assert_eq!(err.to_string(), "request timeout");

        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "connection error: failed to connect");

        let err = Error::hook("token refresh failed");
        assert_eq!(err.to_string(), "pre-retry hook failed: token refresh failed");

        let err = Error::json_deserialization("user.address.city", "missing field `city`");
        assert_eq!(
            err.to_string(),
            "JSON deserialization error at 'user.address.city': missing field `city`"
        );
    }

    #[test]
    fn retries_exhausted_reports_attempts() {
        let err = Error::RetriesExhausted {
            method: Method::Post,
            attempts: 4,
            last_status: Some(503),
            last_error: None,
        };
        assert_eq!(err.to_string(), "POST request giving up after 4 attempt(s)");
        assert_eq!(err.attempts(), Some(4));
        assert_eq!(Error::Timeout.attempts(), None);
    }

    #[test]
    fn retryable_transport_errors() {
        assert!(Error::connection("reset").is_retryable_transport());
        assert!(Error::Timeout.is_retryable_transport());
        assert!(!Error::Cancelled.is_retryable_transport());
        assert!(!Error::invalid_request("bad header").is_retryable_transport());
        assert!(!Error::BodyConsumed.is_retryable_transport());
    }

    #[test]
    fn error_is_timeout() {
        assert!(Error::Timeout.is_timeout());
        assert!(!Error::Cancelled.is_timeout());
    }

    #[test]
    fn error_is_connection() {
        assert!(Error::connection("failed").is_connection());
        assert!(!Error::Timeout.is_connection());
    }

    #[test]
    fn from_url_parse_error() {
        let err: Error = url::Url::parse("not a url").expect_err("invalid").into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
