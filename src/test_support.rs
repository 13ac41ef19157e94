//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::transport::{
    ApiRequest, ApiResponse, HttpSender, Method, RawResponse, SendError, SendFuture, Transport,
    TransportError, TransportFuture,
};

/// Scripted outcome for one [`ScriptedSender`] attempt.
#[derive(Clone, Debug)]
enum SenderStep {
    Respond(Result<RawResponse, SendError>),
    Hang,
}

/// Scripted [`HttpSender`] that replays queued outcomes in FIFO order.
///
/// Used to drive the retry loop without a network. Every attempt is recorded,
/// including attempts that hang until cancelled.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSender {
    steps: Arc<Mutex<VecDeque<SenderStep>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl ScriptedSender {
    /// Creates a sender with no queued outcomes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with `status` and `body`.
    pub fn push_status(&self, status: u16, body: &str) {
        self.push_response(RawResponse::new(status, body.as_bytes().to_vec()));
    }

    /// Queues an explicit response.
    pub fn push_response(&self, response: RawResponse) {
        lock(&self.steps).push_back(SenderStep::Respond(Ok(response)));
    }

    /// Queues a failure below HTTP.
    pub fn push_error(&self, error: SendError) {
        lock(&self.steps).push_back(SenderStep::Respond(Err(error)));
    }

    /// Queues an attempt that never completes.
    pub fn push_hang(&self) {
        lock(&self.steps).push_back(SenderStep::Hang);
    }

    /// Number of attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl HttpSender for ScriptedSender {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a> {
        lock(&self.requests).push(request.clone());
        let step = lock(&self.steps).pop_front();
        Box::pin(async move {
            match step {
                Some(SenderStep::Respond(outcome)) => outcome,
                Some(SenderStep::Hang) => std::future::pending().await,
                None => Err(SendError::invalid("no scripted response available")),
            }
        })
    }
}

/// Records a single call made through [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    /// HTTP method of the request.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// JSON body, when one was sent.
    pub body: Option<Value>,
}

/// Scripted [`Transport`] that replays queued results in FIFO order.
///
/// Used by reconciler tests that do not care about retries.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    results: Arc<Mutex<VecDeque<Result<ApiResponse, TransportError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    /// Creates a transport with no queued results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful JSON response.
    pub fn push_json(&self, status: u16, body: &Value) {
        lock(&self.results).push_back(Ok(ApiResponse {
            status,
            body: body.to_string().into_bytes(),
        }));
    }

    /// Queues a successful response with an empty body.
    pub fn push_empty(&self, status: u16) {
        lock(&self.results).push_back(Ok(ApiResponse {
            status,
            body: Vec::new(),
        }));
    }

    /// Queues a rejection with `status`.
    pub fn push_rejected(&self, method: Method, path: &str, status: u16) {
        lock(&self.results).push_back(Err(TransportError::Rejected {
            method,
            path: path.to_owned(),
            status,
            body: String::from("{\"message\":\"scripted rejection\"}"),
        }));
    }

    /// Queues an arbitrary transport error.
    pub fn push_error(&self, error: TransportError) {
        lock(&self.results).push_back(Err(error));
    }

    /// Snapshot of every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl Transport for ScriptedTransport {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled {
                    method: request.method.clone(),
                    path: request.path.clone(),
                    attempts: 0,
                });
            }
            lock(&self.calls).push(RecordedCall {
                method: request.method.clone(),
                path: request.path.clone(),
                body: request.body.clone(),
            });
            lock(&self.results).pop_front().unwrap_or_else(|| {
                Err(TransportError::InvalidRequest {
                    method: request.method.clone(),
                    path: request.path.clone(),
                    message: String::from("no scripted response available"),
                })
            })
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    ///
    /// Pairs with a `None` value are removed for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
