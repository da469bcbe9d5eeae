//! Error types for batch-dl
//!
//! Two layers of errors live here:
//! - [`FetchError`] is a *classified outcome* for one identifier. It is produced by the
//!   fetch worker and never escapes a run; it only shows up in events and logs.
//! - [`Error`] is what the public API returns. A run fails with [`Error::WorkerDefect`]
//!   only when the worker contract itself is broken, never because of remote behaviour.

use crate::types::Identifier;
use thiserror::Error;

/// Result type alias for batch-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batch-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A fetch worker violated its contract (panicked, or reported the wrong identifier).
    ///
    /// Aborts the whole run: continuing would leave the aggregate counts short.
    #[error("fetch worker for {identifier} failed: {message}")]
    WorkerDefect {
        /// The identifier the defective worker was dispatched for
        identifier: Identifier,
        /// Description of the defect (panic payload, mismatch details)
        message: String,
    },
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Why a single fetch ended in the `error` status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchCause {
    /// The server answered with a status other than 200 or 404
    #[error("HTTP {code} {reason}")]
    Status {
        /// Numeric status code
        code: u16,
        /// Reason phrase (empty if the server sent none)
        reason: String,
    },

    /// Connect, timeout, TLS or protocol failure before a status was available
    #[error("{message}")]
    Transport {
        /// The underlying client error rendered as text
        message: String,
    },

    /// The response arrived but its body could not be decoded
    #[error("invalid response body: {message}")]
    Decode {
        /// Decoder error rendered as text
        message: String,
    },
}

/// A failed fetch, tagged with the identifier it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("*** Error for {identifier}: {cause}")]
pub struct FetchError {
    /// Identifier whose fetch failed
    pub identifier: Identifier,
    /// Original failure, kept intact
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    /// Tag a cause with its identifier
    pub fn new(identifier: Identifier, cause: FetchCause) -> Self {
        Self { identifier, cause }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_cause_renders_code_and_reason() {
        let cause = FetchCause::Status {
            code: 503,
            reason: "Service Unavailable".into(),
        };
        assert_eq!(cause.to_string(), "HTTP 503 Service Unavailable");
    }

    #[test]
    fn fetch_error_names_identifier_and_cause() {
        let err = FetchError::new(
            Identifier::new("BR"),
            FetchCause::Transport {
                message: "connection refused".into(),
            },
        );
        assert_eq!(err.to_string(), "*** Error for BR: connection refused");
    }

    #[test]
    fn fetch_error_exposes_cause_as_source() {
        use std::error::Error as _;

        let err = FetchError::new(
            Identifier::new("CN"),
            FetchCause::Decode {
                message: "expected value".into(),
            },
        );
        let source = err.source().expect("cause should be the source");
        assert_eq!(source.to_string(), "invalid response body: expected value");
    }

    #[test]
    fn config_helper_records_key() {
        match Error::config("concurrency", "must be at least 1") {
            Error::Config { message, key } => {
                assert_eq!(message, "must be at least 1");
                assert_eq!(key.as_deref(), Some("concurrency"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn worker_defect_message_names_identifier() {
        let err = Error::WorkerDefect {
            identifier: Identifier::new("IN"),
            message: "task panicked".into(),
        };
        assert_eq!(
            err.to_string(),
            "fetch worker for IN failed: task panicked"
        );
    }

    fn kind(err: &Error) -> &'static str {
        // Exhaustive: every variant has a constructor path in the crate
        match err {
            Error::Config { .. } => "config",
            Error::Network(_) => "network",
            Error::WorkerDefect { .. } => "worker_defect",
        }
    }

    #[test]
    fn client_build_failure_is_a_network_error() {
        // A header value with a newline is rejected when the client is built
        let build = reqwest::Client::builder().user_agent("bad\nagent").build();
        let err: Error = build.unwrap_err().into();
        assert_eq!(kind(&err), "network");
        assert_eq!(kind(&Error::config("base_url", "missing")), "config");
    }
}
