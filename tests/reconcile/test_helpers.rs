//! Shared fixtures for reconciliation BDD scenarios.

use rstest::fixture;
use weir::resources::redirect::{RedirectArgs, RedirectOutputs};
use weir::resources::site::SiteArgs;
use weir::test_support::ScriptedTransport;
use weir::{Observed, ObservedState, ReadOutcome, Redirect, ReconcileError, ReconcileErrorKind};

pub const SITE_ID: &str = "5f0c8c9e1c9d440000e8d8c4";

#[derive(Clone, Debug)]
pub struct ReconcileContext {
    pub transport: ScriptedTransport,
    pub redirect: RedirectArgs,
    pub site: SiteArgs,
    pub existing: Option<Existing>,
    pub outcome: Option<Outcome>,
}

/// Redirect the host already manages.
#[derive(Clone, Debug)]
pub struct Existing {
    pub handle: String,
    pub observed: ObservedState<Redirect>,
}

#[derive(Clone, Debug)]
pub enum Outcome {
    Created { handle: String },
    Read(ReadOutcome<Redirect>),
    Updated,
    Deleted,
    Failed(Failure),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failure {
    pub code: &'static str,
    pub message: String,
    pub committed_handle: Option<String>,
}

impl From<ReconcileError> for Failure {
    fn from(err: ReconcileError) -> Self {
        let committed_handle = match &err.kind {
            ReconcileErrorKind::PartialSuccess { handle, .. } => Some(handle.clone()),
            _ => None,
        };
        Self {
            code: err.code(),
            message: err.to_string(),
            committed_handle,
        }
    }
}

#[fixture]
pub fn reconcile_context() -> ReconcileContext {
    ReconcileContext {
        transport: ScriptedTransport::new(),
        redirect: redirect_args("/old", "/new"),
        site: SiteArgs {
            workspace_id: String::from("ws-1"),
            display_name: String::from("Marketing"),
            short_name: None,
            parent_folder_id: None,
            template_name: None,
            publish: false,
            publish_domains: Vec::new(),
        },
        existing: None,
        outcome: None,
    }
}

pub fn redirect_args(source: &str, destination: &str) -> RedirectArgs {
    RedirectArgs {
        site_id: SITE_ID.to_owned(),
        source_path: source.to_owned(),
        destination_path: destination.to_owned(),
        status_code: 301,
    }
}

pub fn existing_redirect(remote_id: &str) -> Existing {
    Existing {
        handle: format!("{SITE_ID}/redirects/{remote_id}"),
        observed: Observed {
            inputs: redirect_args("/old", "/new"),
            outputs: RedirectOutputs {
                created_on: Some(String::from("2024-05-01T10:00:00Z")),
            },
        },
    }
}
