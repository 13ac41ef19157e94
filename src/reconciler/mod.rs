//! Generic reconciliation protocol.
//!
//! A [`Reconciler`] sequences validation, the four CRUD verbs, and the
//! plan/apply split for one [`ResourceKind`]. `plan_*` methods are pure and
//! never touch the transport; `apply_*` methods perform the remote calls.
//! Retries live entirely inside the transport.

mod error;

use std::marker::PhantomData;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diff::{self, ChangeSet};
use crate::handle::{self, HandleError, ResourceHandle};
use crate::resources::{Observed, ObservedState, ResourceKind};
use crate::transport::Transport;

pub use error::{Operation, ReconcileError, ReconcileErrorKind};

/// Handle and observed state produced by a create.
#[derive(Clone, Debug, PartialEq)]
pub struct Applied<K: ResourceKind> {
    /// Handle addressing the object.
    pub handle: ResourceHandle,
    /// State to persist.
    pub observed: ObservedState<K>,
}

/// Result of a read.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadOutcome<K: ResourceKind> {
    /// The object exists; its refreshed state.
    Present(ObservedState<K>),
    /// The object no longer exists.
    Absent,
}

/// Drives one resource kind through the reconciliation protocol.
///
/// Reconcilers hold no state beyond their transport, so one instance may
/// serve many handles concurrently.
#[derive(Clone, Debug)]
pub struct Reconciler<K, T> {
    transport: T,
    kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind, T: Transport> Reconciler<K, T> {
    /// Builds a reconciler over `transport`.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            kind: PhantomData,
        }
    }

    /// Compares observed state with desired state. Pure.
    #[must_use]
    pub fn diff(&self, observed: &ObservedState<K>, desired: &K::Desired) -> ChangeSet {
        diff::compute(K::spec().fields, &observed.inputs, desired)
    }

    /// Creates the object, or previews it when `dry_run` is set.
    ///
    /// # Errors
    ///
    /// See [`Self::plan_create`] and [`Self::apply_create`].
    pub async fn create(
        &self,
        desired: &K::Desired,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<Applied<K>, ReconcileError> {
        if dry_run {
            self.plan_create(desired)
        } else {
            self.apply_create(desired, cancel).await
        }
    }

    /// Previews a create with a provisional handle. No remote calls.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileErrorKind::Validation`] when `desired` is invalid.
    pub fn plan_create(&self, desired: &K::Desired) -> Result<Applied<K>, ReconcileError> {
        let target = parent_target::<K>(desired);
        validate::<K>(desired).map_err(|kind| fail::<K>(Operation::Create, &target, kind))?;
        let handle = ResourceHandle::new(
            K::parent_id(desired),
            K::spec().collection,
            K::preview_remote_id(),
        )
        .map_err(|err| fail::<K>(Operation::Create, &target, err))?;

        debug!(resource = K::spec().kind, handle = %handle, "planned create");
        Ok(Applied {
            handle,
            observed: Observed {
                inputs: desired.clone(),
                outputs: K::preview_outputs(desired, None),
            },
        })
    }

    /// Creates the object on the remote and mints its handle.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileErrorKind::Validation`] before any remote call when
    /// `desired` is invalid, [`ReconcileErrorKind::Decode`] when the response
    /// lacks an identifier, [`ReconcileErrorKind::PartialSuccess`] when a
    /// follow-up action fails after the object was written, and the
    /// transport classification otherwise.
    pub async fn apply_create(
        &self,
        desired: &K::Desired,
        cancel: &CancellationToken,
    ) -> Result<Applied<K>, ReconcileError> {
        let target = parent_target::<K>(desired);
        let op = Operation::Create;
        validate::<K>(desired).map_err(|kind| fail::<K>(op, &target, kind))?;

        let request = K::create_request(desired).map_err(|err| fail::<K>(op, &target, err))?;
        let response = self
            .transport
            .execute(&request, cancel)
            .await
            .map_err(|err| fail::<K>(op, &target, err))?;
        let (remote_id, observed) =
            K::parse_created(desired, &response).map_err(|err| fail::<K>(op, &target, err))?;
        let handle = ResourceHandle::new(K::parent_id(desired), K::spec().collection, remote_id)
            .map_err(|err| fail::<K>(op, &target, err))?;

        info!(resource = K::spec().kind, handle = %handle, "created");
        self.follow_up(op, &handle, desired, &observed, cancel)
            .await?;
        Ok(Applied { handle, observed })
    }

    /// Refreshes observed state. A missing object is [`ReadOutcome::Absent`],
    /// never an error.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileErrorKind::InvalidHandle`] for a malformed handle
    /// and the transport classification for other failures.
    pub async fn read(
        &self,
        handle: &str,
        prior: Option<&ObservedState<K>>,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome<K>, ReconcileError> {
        let op = Operation::Read;
        let resolved = decode_for::<K>(op, handle)?;
        let request = K::read_request(&resolved);
        let response = match self.transport.execute(&request, cancel).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => {
                debug!(resource = K::spec().kind, handle = %resolved, "lookup returned 404");
                return Ok(ReadOutcome::Absent);
            }
            Err(err) => return Err(fail::<K>(op, &resolved.to_string(), err)),
        };

        let found = K::parse_read(&resolved, &response, prior)
            .map_err(|err| fail::<K>(op, &resolved.to_string(), err))?;
        debug!(resource = K::spec().kind, handle = %resolved, present = found.is_some(), "read");
        Ok(found.map_or(ReadOutcome::Absent, ReadOutcome::Present))
    }

    /// Patches in-place fields, or previews the patch when `dry_run` is set.
    ///
    /// # Errors
    ///
    /// See [`Self::plan_update`] and [`Self::apply_update`].
    pub async fn update(
        &self,
        handle: &str,
        desired: &K::Desired,
        observed: &ObservedState<K>,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<ObservedState<K>, ReconcileError> {
        if dry_run {
            self.plan_update(handle, desired, observed)
        } else {
            self.apply_update(handle, desired, observed, cancel).await
        }
    }

    /// Previews an update. No remote calls.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileErrorKind::Validation`] for invalid input and
    /// [`ReconcileErrorKind::ImmutableFieldChanged`] when the change needs a
    /// replacement.
    pub fn plan_update(
        &self,
        handle: &str,
        desired: &K::Desired,
        observed: &ObservedState<K>,
    ) -> Result<ObservedState<K>, ReconcileError> {
        let resolved = decode_for::<K>(Operation::Update, handle)?;
        self.check_update(&resolved, desired, observed)?;
        debug!(resource = K::spec().kind, handle = %resolved, "planned update");
        Ok(Observed {
            inputs: desired.clone(),
            outputs: K::preview_outputs(desired, Some(&observed.outputs)),
        })
    }

    /// Sends the patch verb with only the in-place fields.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::plan_update`] before any remote call,
    /// [`ReconcileErrorKind::NotFound`] when the object has gone,
    /// [`ReconcileErrorKind::PartialSuccess`] when a follow-up action fails
    /// after the patch, and the transport classification otherwise.
    pub async fn apply_update(
        &self,
        handle: &str,
        desired: &K::Desired,
        observed: &ObservedState<K>,
        cancel: &CancellationToken,
    ) -> Result<ObservedState<K>, ReconcileError> {
        let op = Operation::Update;
        let resolved = decode_for::<K>(op, handle)?;
        self.check_update(&resolved, desired, observed)?;
        let target = resolved.to_string();

        let request =
            K::update_request(&resolved, desired).map_err(|err| fail::<K>(op, &target, err))?;
        let response = self
            .transport
            .execute(&request, cancel)
            .await
            .map_err(|err| fail::<K>(op, &target, err))?;
        let updated = K::parse_updated(desired, observed, &response)
            .map_err(|err| fail::<K>(op, &target, err))?;

        info!(resource = K::spec().kind, handle = %resolved, "updated");
        self.follow_up(op, &resolved, desired, &updated, cancel)
            .await?;
        Ok(updated)
    }

    /// Deletes the object. An object that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileErrorKind::InvalidHandle`] for a malformed handle
    /// and the transport classification for failures other than 404.
    pub async fn delete(
        &self,
        handle: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let op = Operation::Delete;
        let resolved = decode_for::<K>(op, handle)?;
        let request = K::delete_request(&resolved);
        match self.transport.execute(&request, cancel).await {
            Ok(_) => info!(resource = K::spec().kind, handle = %resolved, "deleted"),
            Err(err) if err.is_not_found() => {
                debug!(resource = K::spec().kind, handle = %resolved, "already absent");
            }
            Err(err) => return Err(fail::<K>(op, &resolved.to_string(), err)),
        }
        Ok(())
    }

    fn check_update(
        &self,
        handle: &ResourceHandle,
        desired: &K::Desired,
        observed: &ObservedState<K>,
    ) -> Result<(), ReconcileError> {
        let target = handle.to_string();
        validate::<K>(desired).map_err(|kind| fail::<K>(Operation::Update, &target, kind))?;
        let changes = self.diff(observed, desired);
        if changes.requires_replace {
            let field = changes.changed_fields().next().unwrap_or_default().to_owned();
            return Err(fail::<K>(
                Operation::Update,
                &target,
                ReconcileErrorKind::ImmutableFieldChanged { field },
            ));
        }
        Ok(())
    }

    async fn follow_up(
        &self,
        op: Operation,
        handle: &ResourceHandle,
        desired: &K::Desired,
        committed: &ObservedState<K>,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let target = handle.to_string();
        let outcome = match K::secondary_action(handle, desired) {
            Ok(None) => return Ok(()),
            Ok(Some(action)) => match self.transport.execute(&action.request, cancel).await {
                Ok(_) => {
                    info!(resource = K::spec().kind, handle = %handle, action = action.name, "follow-up complete");
                    return Ok(());
                }
                Err(err) => (action.name, ReconcileErrorKind::from(err)),
            },
            Err(err) => ("follow-up", ReconcileErrorKind::from(err)),
        };

        let (action, cause) = outcome;
        warn!(resource = K::spec().kind, handle = %handle, action, error = %cause, "follow-up failed after write");
        let committed_json = serde_json::to_value(committed)
            .map_err(|err| fail::<K>(op, &target, crate::resources::CodecError::from(err)))?;
        Err(fail::<K>(
            op,
            &target,
            ReconcileErrorKind::PartialSuccess {
                handle: target.clone(),
                committed: Box::new(committed_json),
                action,
                cause: Box::new(cause),
            },
        ))
    }
}

fn validate<K: ResourceKind>(desired: &K::Desired) -> Result<(), ReconcileErrorKind> {
    K::spec()
        .validate(desired)
        .map_err(|violations| ReconcileErrorKind::Validation { violations })
}

fn decode_for<K: ResourceKind>(op: Operation, raw: &str) -> Result<ResourceHandle, ReconcileError> {
    let decoded = handle::decode(raw).map_err(|err| fail::<K>(op, raw, err))?;
    let expected = K::spec().collection;
    if decoded.collection() != expected {
        return Err(fail::<K>(
            op,
            raw,
            HandleError::Malformed {
                handle: raw.to_owned(),
                reason: format!(
                    "collection `{}` does not match `{expected}`",
                    decoded.collection()
                ),
            },
        ));
    }
    Ok(decoded)
}

fn parent_target<K: ResourceKind>(desired: &K::Desired) -> String {
    format!("{}/{}", K::parent_id(desired), K::spec().collection)
}

fn fail<K: ResourceKind>(
    operation: Operation,
    target: &str,
    kind: impl Into<ReconcileErrorKind>,
) -> ReconcileError {
    ReconcileError {
        operation,
        resource: K::spec().kind,
        target: target.to_owned(),
        kind: kind.into(),
    }
}
