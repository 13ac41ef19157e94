//! Remote object kinds managed by the reconciler.
//!
//! Each kind is a zero-sized marker implementing [`ResourceKind`]. It
//! supplies the field table, validators, and the mapping between typed state
//! and Webflow v2 requests and responses. The reconciler drives every kind
//! through the same protocol.

pub mod redirect;
pub mod robots_txt;
pub mod site;
pub mod validation;

use std::fmt;
use std::fmt::Debug;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::diff::{FieldSpec, FieldValues, Mutability};
use crate::handle::ResourceHandle;
use crate::transport::{ApiRequest, ApiResponse};

pub use redirect::Redirect;
pub use robots_txt::RobotsTxt;
pub use site::Site;

/// Prefix of remote identifiers synthesised during dry runs.
pub const PREVIEW_PREFIX: &str = "preview-";

/// A single failed pre-flight check.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Violation {
    /// Field that failed validation.
    pub field: &'static str,
    /// Actionable description of the problem.
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Pure check applied to one field of a desired state.
pub struct FieldValidator<D: 'static> {
    /// Field the check guards.
    pub field: &'static str,
    /// Returns the reason when the value is unacceptable.
    pub check: fn(&D) -> Result<(), String>,
}

/// Static description of a resource kind.
pub struct ResourceSpec<D: 'static> {
    /// Kind name used in logs and errors.
    pub kind: &'static str,
    /// Collection segment of the kind's handles.
    pub collection: &'static str,
    /// Field table with mutability classes.
    pub fields: &'static [FieldSpec],
    /// Pre-flight validators.
    pub validators: &'static [FieldValidator<D>],
}

impl<D> ResourceSpec<D> {
    /// Runs every validator and collects all violations.
    ///
    /// # Errors
    ///
    /// Returns every [`Violation`] found, in validator order.
    pub fn validate(&self, desired: &D) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> = self
            .validators
            .iter()
            .filter_map(|validator| {
                (validator.check)(desired)
                    .err()
                    .map(|reason| Violation {
                        field: validator.field,
                        reason,
                    })
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Names of fields sent by the patch verb.
    pub fn in_place_fields(&self) -> impl Iterator<Item = &'static str> {
        self.fields
            .iter()
            .filter(|field| field.mutability == Mutability::InPlace)
            .map(|field| field.name)
    }
}

/// Desired inputs plus remote-only outputs, persisted by the host as one
/// flat JSON object.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Observed<D, O> {
    /// Input fields as last applied or read.
    #[serde(flatten)]
    pub inputs: D,
    /// Fields computed by the remote.
    #[serde(flatten)]
    pub outputs: O,
}

/// Observed state of kind `K`.
pub type ObservedState<K> = Observed<<K as ResourceKind>::Desired, <K as ResourceKind>::Outputs>;

/// Follow-up request issued after a successful primary write.
#[derive(Clone, Debug, PartialEq)]
pub struct SecondaryAction {
    /// Short action name used in logs and partial-success errors.
    pub name: &'static str,
    /// Request to execute.
    pub request: ApiRequest,
}

/// Failure to map between typed state and the wire format.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Contract between the generic reconciler and one remote object kind.
pub trait ResourceKind: Sized + Send + Sync + 'static {
    /// Typed desired state.
    type Desired: Clone
        + Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + FieldValues
        + Send
        + Sync;
    /// Remote-only output fields.
    type Outputs: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync;

    /// Field table and validators.
    fn spec() -> &'static ResourceSpec<Self::Desired>;

    /// Parent scope the object lives in.
    fn parent_id(desired: &Self::Desired) -> &str;

    /// Remote identifier used for dry-run handles.
    fn preview_remote_id() -> String {
        preview_id()
    }

    /// Plausible outputs for a dry run.
    fn preview_outputs(desired: &Self::Desired, prior: Option<&Self::Outputs>) -> Self::Outputs;

    /// Request that creates the object.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the payload cannot be encoded.
    fn create_request(desired: &Self::Desired) -> Result<ApiRequest, CodecError>;

    /// Extracts the remote identifier and observed state from a create
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the response cannot be decoded.
    fn parse_created(
        desired: &Self::Desired,
        response: &ApiResponse,
    ) -> Result<(String, ObservedState<Self>), CodecError>;

    /// Request that fetches the object or the listing containing it.
    fn read_request(handle: &ResourceHandle) -> ApiRequest;

    /// Locates the object in a read response; `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the response cannot be decoded.
    fn parse_read(
        handle: &ResourceHandle,
        response: &ApiResponse,
        prior: Option<&ObservedState<Self>>,
    ) -> Result<Option<ObservedState<Self>>, CodecError>;

    /// Request that patches the in-place fields.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the payload cannot be encoded.
    fn update_request(
        handle: &ResourceHandle,
        desired: &Self::Desired,
    ) -> Result<ApiRequest, CodecError>;

    /// Folds an update response into the new observed state.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the response cannot be decoded.
    fn parse_updated(
        desired: &Self::Desired,
        previous: &ObservedState<Self>,
        response: &ApiResponse,
    ) -> Result<ObservedState<Self>, CodecError>;

    /// Request that deletes the object.
    fn delete_request(handle: &ResourceHandle) -> ApiRequest;

    /// Follow-up request to issue after a successful create or update.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the payload cannot be encoded.
    fn secondary_action(
        _handle: &ResourceHandle,
        _desired: &Self::Desired,
    ) -> Result<Option<SecondaryAction>, CodecError> {
        Ok(None)
    }
}

/// Synthesises a provisional remote identifier for dry runs.
#[must_use]
pub fn preview_id() -> String {
    format!("{PREVIEW_PREFIX}{}", Uuid::new_v4().simple())
}

/// Current time in RFC 3339 with second precision.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
