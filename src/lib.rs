//! Core library for weir, a Webflow resource reconciler.
//!
//! The crate maps a small set of Webflow objects (sites, redirects, and
//! robots.txt) onto a uniform reconciliation protocol: validate, plan,
//! apply, read, diff, and delete. Every remote call goes through a
//! rate-limit aware transport that retries with bounded exponential backoff
//! and honours cancellation.

pub mod config;
pub mod diff;
pub mod handle;
pub mod logging;
pub mod reconciler;
pub mod resources;
pub mod test_support;
pub mod transport;

pub use config::{ConfigError, WebflowConfig};
pub use diff::{ChangeSet, FieldChange, Mutability};
pub use handle::{HandleError, ResourceHandle};
pub use reconciler::{
    Applied, Operation, ReadOutcome, ReconcileError, ReconcileErrorKind, Reconciler,
};
pub use resources::{Observed, ObservedState, Redirect, ResourceKind, RobotsTxt, Site};
pub use transport::{
    ApiRequest, ApiResponse, ReqwestSender, RetryPolicy, RetryingTransport, Transport,
    TransportError,
};
