//! Retrying HTTP transport.
//!
//! [`RetryingTransport`] turns one logical request into at most
//! `max_retries + 1` attempts through an [`HttpSender`]. HTTP 429, 5xx and
//! transient network failures are retried with bounded exponential backoff;
//! a `Retry-After` header on 429 overrides the computed delay. Every attempt
//! and every wait is raced against a [`CancellationToken`].

mod error;
mod policy;
mod sender;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::logging::truncate_for_logging;

pub use error::{FailureKind, NetworkFailure, TransportError};
pub use policy::{DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES, RetryPolicy};
pub use sender::{
    API_VERSION, HttpSender, RawResponse, ReqwestSender, SendError, SendFuture, USER_AGENT,
    parse_retry_after,
};

/// Longest response body quoted in errors and logs.
const BODY_PREVIEW_CHARS: usize = 512;

/// One logical API request.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base URL, starting with `/`.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Builds a request without a body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Builds a request carrying `payload` serialised as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error when `payload` cannot be represented
    /// as JSON.
    pub fn with_json<T: Serialize>(
        method: Method,
        path: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method,
            path: path.into(),
            body: Some(serde_json::to_value(payload)?),
        })
    }
}

/// Successful (2xx or 3xx) response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the deserialisation error when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Returns `true` when the body is empty or only whitespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + Send + 'a>>;

/// Executes logical requests against the remote API.
pub trait Transport: Send + Sync {
    /// Runs `request` to completion, retrying where appropriate.
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a> {
        (**self).execute(request, cancel)
    }
}

/// [`Transport`] that retries through an [`HttpSender`].
#[derive(Clone, Debug)]
pub struct RetryingTransport<S> {
    sender: S,
    policy: RetryPolicy,
}

struct RetryableFailure {
    kind: FailureKind,
    cause: String,
    retry_after: Option<Duration>,
}

enum Outcome {
    Done(Result<ApiResponse, TransportError>),
    Retry(RetryableFailure),
}

impl<S: HttpSender> RetryingTransport<S> {
    /// Wraps `sender` with the given retry policy.
    #[must_use]
    pub const fn new(sender: S, policy: RetryPolicy) -> Self {
        Self { sender, policy }
    }

    /// Policy applied by this transport.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn run(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, TransportError> {
        let mut attempts: u32 = 0;
        let mut last_wait = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(request, attempts));
            }
            attempts = attempts.saturating_add(1);

            let sent = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(request, attempts)),
                sent = self.sender.send(request) => sent,
            };

            let failure = match classify(request, sent, attempts) {
                Outcome::Done(result) => return result,
                Outcome::Retry(failure) => failure,
            };

            if attempts >= self.policy.max_attempts() {
                return Err(TransportError::Exhausted {
                    method: request.method.clone(),
                    path: request.path.clone(),
                    kind: failure.kind,
                    attempts,
                    last_wait,
                    cause: failure.cause,
                });
            }

            let wait = failure
                .retry_after
                .unwrap_or_else(|| self.policy.backoff(attempts));
            warn!(
                method = %request.method,
                path = %request.path,
                attempt = attempts,
                kind = %failure.kind,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "retrying request"
            );
            last_wait = wait;

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(request, attempts)),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}

impl<S: HttpSender> Transport for RetryingTransport<S> {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a> {
        Box::pin(self.run(request, cancel))
    }
}

fn classify(
    request: &ApiRequest,
    sent: Result<RawResponse, SendError>,
    attempt: u32,
) -> Outcome {
    let raw = match sent {
        Ok(raw) => raw,
        Err(err) => {
            debug!(method = %request.method, path = %request.path, attempt, error = %err, "request failed");
            return match err.class {
                Some(class) => Outcome::Retry(RetryableFailure {
                    kind: FailureKind::Network(class),
                    cause: err.message,
                    retry_after: None,
                }),
                None => Outcome::Done(Err(TransportError::InvalidRequest {
                    method: request.method.clone(),
                    path: request.path.clone(),
                    message: err.message,
                })),
            };
        }
    };

    debug!(method = %request.method, path = %request.path, attempt, status = raw.status, "response received");
    let body_text = || {
        truncate_for_logging(&String::from_utf8_lossy(&raw.body), BODY_PREVIEW_CHARS).into_owned()
    };

    match raw.status {
        429 => Outcome::Retry(RetryableFailure {
            kind: FailureKind::RateLimited,
            cause: format!("HTTP 429: {}", body_text()),
            retry_after: raw.retry_after,
        }),
        status @ 500..=599 => Outcome::Retry(RetryableFailure {
            kind: FailureKind::Server(status),
            cause: format!("HTTP {status}: {}", body_text()),
            retry_after: None,
        }),
        status @ 400..=499 => {
            debug!(method = %request.method, path = %request.path, status, body = %body_text(), "request rejected");
            Outcome::Done(Err(TransportError::Rejected {
                method: request.method.clone(),
                path: request.path.clone(),
                status,
                body: String::from_utf8_lossy(&raw.body).into_owned(),
            }))
        }
        status => Outcome::Done(Ok(ApiResponse {
            status,
            body: raw.body,
        })),
    }
}

fn cancelled(request: &ApiRequest, attempts: u32) -> TransportError {
    TransportError::Cancelled {
        method: request.method.clone(),
        path: request.path.clone(),
        attempts,
    }
}

#[cfg(test)]
mod tests;
