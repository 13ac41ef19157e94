//! BDD step definitions for the reconciliation lifecycle.

use rstest_bdd_macros::{given, then, when};
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use weir::resources::PREVIEW_PREFIX;
use weir::transport::Method;
use weir::{ReadOutcome, Reconciler, Redirect, ResourceHandle, Site};

use super::test_helpers::{
    Existing, Failure, Outcome, ReconcileContext, existing_redirect, redirect_args,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

fn existing(context: &ReconcileContext) -> Result<&Existing, StepError> {
    context
        .existing
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no existing redirect")))
}

#[given("a redirect from \"{source}\" to \"{destination}\"")]
fn redirect_from(
    mut reconcile_context: ReconcileContext,
    source: String,
    destination: String,
) -> ReconcileContext {
    reconcile_context.redirect = redirect_args(&source, &destination);
    reconcile_context
}

#[given("the remote accepts the create as \"{remote_id}\"")]
fn remote_accepts_create(reconcile_context: ReconcileContext, remote_id: String) -> ReconcileContext {
    let args = &reconcile_context.redirect;
    reconcile_context.transport.push_json(
        201,
        &json!({
            "id": remote_id,
            "fromUrl": args.source_path,
            "toUrl": args.destination_path,
            "statusCode": args.status_code,
        }),
    );
    reconcile_context
}

#[given("an existing redirect \"{remote_id}\"")]
fn existing_redirect_step(
    mut reconcile_context: ReconcileContext,
    remote_id: String,
) -> ReconcileContext {
    let current = existing_redirect(&remote_id);
    reconcile_context.redirect = current.observed.inputs.clone();
    reconcile_context.existing = Some(current);
    reconcile_context
}

#[given("the remote lists no redirects")]
fn remote_lists_nothing(reconcile_context: ReconcileContext) -> ReconcileContext {
    reconcile_context
        .transport
        .push_json(200, &json!({"redirects": []}));
    reconcile_context
}

#[given("the desired destination is \"{destination}\"")]
fn desired_destination(
    mut reconcile_context: ReconcileContext,
    destination: String,
) -> ReconcileContext {
    reconcile_context.redirect.destination_path = destination;
    reconcile_context
}

#[given("the desired source is \"{source}\"")]
fn desired_source(mut reconcile_context: ReconcileContext, source: String) -> ReconcileContext {
    reconcile_context.redirect.source_path = source;
    reconcile_context
}

#[given("the remote accepts the update")]
fn remote_accepts_update(reconcile_context: ReconcileContext) -> ReconcileContext {
    reconcile_context.transport.push_json(200, &json!({}));
    reconcile_context
}

#[given("the remote reports the redirect missing")]
fn remote_reports_missing(reconcile_context: ReconcileContext) -> ReconcileContext {
    reconcile_context.transport.push_rejected(
        Method::DELETE,
        "/v2/sites/5f0c8c9e1c9d440000e8d8c4/redirects/r1",
        404,
    );
    reconcile_context
}

#[given("a site named \"{name}\" that publishes on apply")]
fn publishing_site(mut reconcile_context: ReconcileContext, name: String) -> ReconcileContext {
    reconcile_context.site.display_name = name;
    reconcile_context.site.publish = true;
    reconcile_context
}

#[given("the remote accepts the site create as \"{remote_id}\"")]
fn remote_accepts_site(reconcile_context: ReconcileContext, remote_id: String) -> ReconcileContext {
    let name = reconcile_context.site.display_name.clone();
    reconcile_context
        .transport
        .push_json(200, &json!({"id": remote_id, "displayName": name}));
    reconcile_context
}

#[given("publishing fails with status \"{status}\"")]
fn publishing_fails(reconcile_context: ReconcileContext, status: u16) -> ReconcileContext {
    reconcile_context
        .transport
        .push_rejected(Method::POST, "/v2/sites/publish", status);
    reconcile_context
}

#[when("I create the redirect")]
fn create_redirect(reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    create(reconcile_context, false)
}

#[when("I plan the redirect")]
fn plan_redirect(reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    create(reconcile_context, true)
}

fn create(
    mut reconcile_context: ReconcileContext,
    dry_run: bool,
) -> Result<ReconcileContext, StepError> {
    let reconciler = Reconciler::<Redirect, _>::new(reconcile_context.transport.clone());
    let desired = reconcile_context.redirect.clone();
    let result = runtime()?.block_on(async move {
        reconciler
            .create(&desired, dry_run, &CancellationToken::new())
            .await
    });
    reconcile_context.outcome = Some(match result {
        Ok(applied) => Outcome::Created {
            handle: applied.handle.to_string(),
        },
        Err(err) => Outcome::Failed(Failure::from(err)),
    });
    Ok(reconcile_context)
}

#[when("I read the redirect")]
fn read_redirect(mut reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    let current = existing(&reconcile_context)?.clone();
    let reconciler = Reconciler::<Redirect, _>::new(reconcile_context.transport.clone());
    let result = runtime()?.block_on(async move {
        reconciler
            .read(
                &current.handle,
                Some(&current.observed),
                &CancellationToken::new(),
            )
            .await
    });
    reconcile_context.outcome = Some(match result {
        Ok(outcome) => Outcome::Read(outcome),
        Err(err) => Outcome::Failed(Failure::from(err)),
    });
    Ok(reconcile_context)
}

#[when("I update the redirect")]
fn update_redirect(
    mut reconcile_context: ReconcileContext,
) -> Result<ReconcileContext, StepError> {
    let current = existing(&reconcile_context)?.clone();
    let desired = reconcile_context.redirect.clone();
    let reconciler = Reconciler::<Redirect, _>::new(reconcile_context.transport.clone());
    let result = runtime()?.block_on(async move {
        reconciler
            .update(
                &current.handle,
                &desired,
                &current.observed,
                false,
                &CancellationToken::new(),
            )
            .await
    });
    reconcile_context.outcome = Some(match result {
        Ok(_) => Outcome::Updated,
        Err(err) => Outcome::Failed(Failure::from(err)),
    });
    Ok(reconcile_context)
}

#[when("I delete the redirect")]
fn delete_redirect(
    mut reconcile_context: ReconcileContext,
) -> Result<ReconcileContext, StepError> {
    let handle = existing(&reconcile_context)?.handle.clone();
    let reconciler = Reconciler::<Redirect, _>::new(reconcile_context.transport.clone());
    let result = runtime()?
        .block_on(async move { reconciler.delete(&handle, &CancellationToken::new()).await });
    reconcile_context.outcome = Some(match result {
        Ok(()) => Outcome::Deleted,
        Err(err) => Outcome::Failed(Failure::from(err)),
    });
    Ok(reconcile_context)
}

#[when("I create the site")]
fn create_site(mut reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    let reconciler = Reconciler::<Site, _>::new(reconcile_context.transport.clone());
    let desired = reconcile_context.site.clone();
    let result = runtime()?.block_on(async move {
        reconciler
            .create(&desired, false, &CancellationToken::new())
            .await
    });
    reconcile_context.outcome = Some(match result {
        Ok(applied) => Outcome::Created {
            handle: applied.handle.to_string(),
        },
        Err(err) => Outcome::Failed(Failure::from(err)),
    });
    Ok(reconcile_context)
}

fn created_handle(context: &ReconcileContext) -> Result<&str, StepError> {
    match &context.outcome {
        Some(Outcome::Created { handle }) => Ok(handle),
        Some(Outcome::Failed(failure)) => Err(StepError::Assertion(format!(
            "expected a handle, got failure: {}",
            failure.message
        ))),
        other => Err(StepError::Assertion(format!(
            "expected a handle, got {other:?}"
        ))),
    }
}

fn failure(context: &ReconcileContext) -> Result<&Failure, StepError> {
    match &context.outcome {
        Some(Outcome::Failed(failure)) => Ok(failure),
        other => Err(StepError::Assertion(format!(
            "expected failure outcome, got {other:?}"
        ))),
    }
}

fn patch_body(context: &ReconcileContext) -> Result<Value, StepError> {
    context
        .transport
        .calls()
        .into_iter()
        .find(|call| call.method == Method::PATCH)
        .and_then(|call| call.body)
        .ok_or_else(|| StepError::Assertion(String::from("no patch request was sent")))
}

#[then("the handle is \"{expected}\"")]
fn handle_is(reconcile_context: &ReconcileContext, expected: String) -> Result<(), StepError> {
    let actual = created_handle(reconcile_context)?;
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected handle {expected}, got {actual}"
        )))
    }
}

#[then("the handle carries a preview id")]
fn handle_is_preview(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let raw = created_handle(reconcile_context)?;
    let handle: ResourceHandle = raw
        .parse()
        .map_err(|err| StepError::Assertion(format!("handle should decode: {err}")))?;
    if handle.remote_id().starts_with(PREVIEW_PREFIX) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a preview id, got {raw}"
        )))
    }
}

fn assert_call_count(context: &ReconcileContext, expected: usize) -> Result<(), StepError> {
    let actual = context.transport.call_count();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected} remote call(s), got {actual}"
        )))
    }
}

#[then("{count} remote call was made")]
fn remote_calls_made(reconcile_context: &ReconcileContext, count: usize) -> Result<(), StepError> {
    assert_call_count(reconcile_context, count)
}

#[then("no remote calls were made")]
fn no_remote_calls(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    assert_call_count(reconcile_context, 0)
}

#[then("the error code is \"{code}\"")]
fn error_code_is(reconcile_context: &ReconcileContext, code: String) -> Result<(), StepError> {
    let failure = failure(reconcile_context)?;
    if failure.code == code {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {code}, got {}: {}",
            failure.code, failure.message
        )))
    }
}

#[then("the redirect is absent")]
fn redirect_absent(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    match &reconcile_context.outcome {
        Some(Outcome::Read(ReadOutcome::Absent)) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected an absent redirect, got {other:?}"
        ))),
    }
}

#[then("the patch body sets \"{field}\" to \"{value}\"")]
fn patch_sets(
    reconcile_context: &ReconcileContext,
    field: String,
    value: String,
) -> Result<(), StepError> {
    let body = patch_body(reconcile_context)?;
    if body.get(&field) == Some(&Value::String(value.clone())) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {field} = {value} in {body}"
        )))
    }
}

#[then("the patch body omits \"{field}\"")]
fn patch_omits(reconcile_context: &ReconcileContext, field: String) -> Result<(), StepError> {
    let body = patch_body(reconcile_context)?;
    if body.get(&field).is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "patch body should not contain {field}: {body}"
        )))
    }
}

#[then("the operation succeeds")]
fn operation_succeeds(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    match &reconcile_context.outcome {
        Some(Outcome::Failed(failure)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {}",
            failure.message
        ))),
        Some(_) => Ok(()),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the committed handle is \"{expected}\"")]
fn committed_handle(
    reconcile_context: &ReconcileContext,
    expected: String,
) -> Result<(), StepError> {
    let failure = failure(reconcile_context)?;
    match failure.committed_handle.as_deref() {
        Some(handle) if handle == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected committed handle {expected}, got {other:?}"
        ))),
    }
}
