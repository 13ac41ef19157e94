//! Error types for the retrying transport.

use std::fmt;
use std::time::Duration;

use reqwest::Method;
use thiserror::Error;

/// Class of a transport-level network failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetworkFailure {
    /// The request or response exceeded the client timeout.
    Timeout,
    /// The connection could not be established (refused or DNS failure).
    Connect,
    /// The connection dropped while the response body was being read.
    Body,
    /// Any other failure reported by the HTTP client.
    Other,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::Connect => "connection failure",
            Self::Body => "body read failure",
            Self::Other => "network failure",
        })
    }
}

/// Category of the last failure before retries ran out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// The remote kept answering HTTP 429.
    RateLimited,
    /// The remote kept answering with a 5xx status.
    Server(u16),
    /// The request kept failing below HTTP.
    Network(NetworkFailure),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => f.write_str("rate limited"),
            Self::Server(status) => write!(f, "server error {status}"),
            Self::Network(class) => class.fmt(f),
        }
    }
}

/// Errors returned by [`crate::transport::Transport::execute`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// The caller cancelled the request before it completed.
    #[error("{method} {path} cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// HTTP method of the request.
        method: Method,
        /// Request path relative to the API base URL.
        path: String,
        /// Attempts started before cancellation.
        attempts: u32,
    },
    /// The remote rejected the request with a non-retryable status.
    #[error("{method} {path} rejected with HTTP {status}: {body}")]
    Rejected {
        /// HTTP method of the request.
        method: Method,
        /// Request path relative to the API base URL.
        path: String,
        /// Status code returned by the remote.
        status: u16,
        /// Response body as returned.
        body: String,
    },
    /// Every permitted attempt failed with a retryable error.
    #[error("{method} {path} failed after {attempts} attempt(s) ({kind}, last wait {last_wait:?}): {cause}")]
    Exhausted {
        /// HTTP method of the request.
        method: Method,
        /// Request path relative to the API base URL.
        path: String,
        /// Category of the final failure.
        kind: FailureKind,
        /// Total attempts made, including the first.
        attempts: u32,
        /// Duration of the last backoff wait.
        last_wait: Duration,
        /// Description of the final failure.
        cause: String,
    },
    /// The request could not be built or sent at all.
    #[error("{method} {path} could not be sent: {message}")]
    InvalidRequest {
        /// HTTP method of the request.
        method: Method,
        /// Request path relative to the API base URL.
        path: String,
        /// Message reported by the HTTP client.
        message: String,
    },
}

impl TransportError {
    /// Returns the HTTP status when the remote rejected the request.
    #[must_use]
    pub const fn rejected_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when the remote reported the target as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.rejected_status(), Some(404))
    }
}
