//! Error types for reconciliation.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::handle::HandleError;
use crate::resources::{CodecError, Violation};
use crate::transport::{FailureKind, NetworkFailure, TransportError};

/// Reconciler entry point that failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Create or plan a new object.
    Create,
    /// Refresh observed state.
    Read,
    /// Patch an existing object.
    Update,
    /// Remove an object.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Failure returned by every reconciler operation, attributed to the
/// operation, the resource kind, and the handle or parent scope.
#[derive(Debug, Error)]
#[error("{operation} {resource} `{target}` failed: {kind}")]
pub struct ReconcileError {
    /// Operation that failed.
    pub operation: Operation,
    /// Resource kind name.
    pub resource: &'static str,
    /// Handle, or `{parentId}/{collection}` before a handle exists.
    pub target: String,
    /// What went wrong.
    #[source]
    pub kind: ReconcileErrorKind,
}

impl ReconcileError {
    /// Stable machine-readable code for the failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Classified reconciliation failure.
#[derive(Debug, Error)]
pub enum ReconcileErrorKind {
    /// Desired state failed pre-flight validation; nothing was sent.
    #[error("invalid desired state: {}", join(.violations))]
    Validation {
        /// Every violation found.
        violations: Vec<Violation>,
    },
    /// The object no longer exists on the remote.
    #[error("object not found on the remote")]
    NotFound,
    /// The remote kept rate limiting until retries ran out.
    #[error("rate limited after {attempts} attempt(s), last wait {last_wait:?}: {cause}")]
    RateLimited {
        /// Attempts made.
        attempts: u32,
        /// Duration of the last backoff wait.
        last_wait: Duration,
        /// Message of the last failure.
        cause: String,
    },
    /// The network kept failing until retries ran out.
    #[error("{failure} after {attempts} attempt(s): {cause}")]
    Network {
        /// Failure class of the last attempt.
        failure: NetworkFailure,
        /// Attempts made.
        attempts: u32,
        /// Message of the last failure.
        cause: String,
    },
    /// The remote kept failing with 5xx until retries ran out.
    #[error("remote unavailable (HTTP {status}) after {attempts} attempt(s): {cause}")]
    ServerUnavailable {
        /// Last status returned.
        status: u16,
        /// Attempts made.
        attempts: u32,
        /// Message of the last failure.
        cause: String,
    },
    /// The remote rejected the request.
    #[error("remote rejected the request with HTTP {status}: {body}")]
    Remote {
        /// Status returned.
        status: u16,
        /// Response body as returned.
        body: String,
    },
    /// The request could not be built or sent; nothing reached the remote.
    #[error("request could not be sent: {message}")]
    InvalidRequest {
        /// Why the request was refused.
        message: String,
    },
    /// The caller cancelled the operation.
    #[error("cancelled")]
    Cancelled,
    /// The handle could not be decoded or does not belong to this kind.
    #[error(transparent)]
    InvalidHandle(#[from] HandleError),
    /// A request or response could not be mapped.
    #[error("could not decode remote data: {0}")]
    Decode(#[from] CodecError),
    /// An update was asked to change a field that forces replacement.
    #[error("field `{field}` cannot change in place; replace the resource instead")]
    ImmutableFieldChanged {
        /// Field that differs.
        field: String,
    },
    /// The primary write committed but a follow-up action failed.
    #[error("{action} failed after {handle} was written: {cause}")]
    PartialSuccess {
        /// Handle of the committed object.
        handle: String,
        /// Observed state of the committed object.
        committed: Box<Value>,
        /// Follow-up action that failed.
        action: &'static str,
        /// Failure of the follow-up action.
        cause: Box<ReconcileErrorKind>,
    },
}

impl ReconcileErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "WEIR_VALIDATION",
            Self::NotFound => "WEIR_NOT_FOUND",
            Self::RateLimited { .. } => "WEIR_RATE_LIMITED",
            Self::Network { .. } => "WEIR_NETWORK",
            Self::ServerUnavailable { .. } => "WEIR_SERVER_UNAVAILABLE",
            Self::Remote { .. } => "WEIR_REMOTE",
            Self::InvalidRequest { .. } => "WEIR_INVALID_REQUEST",
            Self::Cancelled => "WEIR_CANCELLED",
            Self::InvalidHandle(_) => "WEIR_INVALID_HANDLE",
            Self::Decode(_) => "WEIR_DECODE",
            Self::ImmutableFieldChanged { .. } => "WEIR_IMMUTABLE_FIELD",
            Self::PartialSuccess { .. } => "WEIR_PARTIAL_SUCCESS",
        }
    }
}

impl From<TransportError> for ReconcileErrorKind {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled { .. } => Self::Cancelled,
            TransportError::Rejected { status: 404, .. } => Self::NotFound,
            TransportError::Rejected { status, body, .. } => Self::Remote { status, body },
            TransportError::Exhausted {
                kind,
                attempts,
                last_wait,
                cause,
                ..
            } => match kind {
                FailureKind::RateLimited => Self::RateLimited {
                    attempts,
                    last_wait,
                    cause,
                },
                FailureKind::Server(status) => Self::ServerUnavailable {
                    status,
                    attempts,
                    cause,
                },
                FailureKind::Network(failure) => Self::Network {
                    failure,
                    attempts,
                    cause,
                },
            },
            TransportError::InvalidRequest { message, .. } => Self::InvalidRequest { message },
        }
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
