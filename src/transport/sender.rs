//! Single-attempt HTTP exchange.
//!
//! [`HttpSender`] performs exactly one request and reports what happened
//! without judging it; retry decisions belong to the transport loop.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use thiserror::Error;

use super::ApiRequest;
use super::error::NetworkFailure;

/// Version header value expected by the Webflow v2 API.
pub const API_VERSION: &str = "2.0.0";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("weir/", env!("CARGO_PKG_VERSION"));

/// Boxed future returned by [`HttpSender::send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<RawResponse, SendError>> + Send + 'a>>;

/// Fully buffered response from one attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed `Retry-After` header, when present and valid.
    pub retry_after: Option<Duration>,
    /// Response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Builds a response with the given status and body and no `Retry-After`.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Attaches a `Retry-After` duration.
    #[must_use]
    pub const fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Failure below the HTTP layer for a single attempt.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct SendError {
    /// Failure class, or `None` when the request itself was invalid.
    pub class: Option<NetworkFailure>,
    /// Message reported by the HTTP client.
    pub message: String,
}

impl SendError {
    /// Builds a retryable network failure.
    #[must_use]
    pub fn network(class: NetworkFailure, message: impl Into<String>) -> Self {
        Self {
            class: Some(class),
            message: message.into(),
        }
    }

    /// Builds a failure for a request that could never succeed.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            class: None,
            message: message.into(),
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::invalid(err.to_string());
        }
        let class = if err.is_timeout() {
            NetworkFailure::Timeout
        } else if err.is_connect() {
            NetworkFailure::Connect
        } else if err.is_body() || err.is_decode() {
            NetworkFailure::Body
        } else {
            NetworkFailure::Other
        };
        Self::network(class, err.to_string())
    }
}

/// Performs one HTTP exchange.
pub trait HttpSender: Send + Sync {
    /// Sends the request once and buffers the full response.
    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a>;
}

/// [`HttpSender`] backed by a pooled `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestSender {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl ReqwestSender {
    /// Builds a sender with bearer authentication and a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the underlying client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| SendError::invalid(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_token: api_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl HttpSender for ReqwestSender {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method.clone(), self.url(&request.path))
                .bearer_auth(&self.api_token)
                .header("Accept-Version", API_VERSION);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|err| SendError::from_reqwest(&err))?;
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response
                .bytes()
                .await
                .map_err(|err| SendError::from_reqwest(&err))?;

            Ok(RawResponse {
                status,
                retry_after,
                body: body.to_vec(),
            })
        })
    }
}

/// Parses a `Retry-After` value expressed in whole seconds.
///
/// HTTP dates, zero, and unparsable values yield `None` so the caller falls
/// back to computed backoff.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}
