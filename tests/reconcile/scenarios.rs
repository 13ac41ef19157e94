//! BDD scenarios for the reconciliation lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ReconcileContext, reconcile_context};

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Create a redirect and mint its handle"
)]
fn scenario_create_redirect(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Dry-run create previews without remote calls"
)]
fn scenario_dry_run_create(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Invalid input is rejected before any remote call"
)]
fn scenario_invalid_input(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "A redirect removed out of band reads as absent"
)]
fn scenario_read_absent(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Updating the destination patches only mutable fields"
)]
fn scenario_update_destination(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Changing the source path requires replacement"
)]
fn scenario_identity_change(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Deleting an object that is already gone succeeds"
)]
fn scenario_delete_gone(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "A failed publish after create reports partial success"
)]
fn scenario_partial_success(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}
