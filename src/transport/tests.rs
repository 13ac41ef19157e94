//! Unit tests for the retrying transport.

use super::*;
use crate::test_support::ScriptedSender;
use rstest::rstest;
use tokio::time::Instant;

fn get(path: &str) -> ApiRequest {
    ApiRequest::new(Method::GET, path)
}

fn transport(sender: &ScriptedSender, policy: RetryPolicy) -> RetryingTransport<ScriptedSender> {
    RetryingTransport::new(sender.clone(), policy)
}

#[rstest]
#[case(1, Duration::from_secs(1))]
#[case(2, Duration::from_secs(2))]
#[case(3, Duration::from_secs(4))]
#[case(5, Duration::from_secs(16))]
#[case(6, Duration::from_secs(30))]
#[case(64, Duration::from_secs(30))]
fn backoff_doubles_and_clamps(#[case] retry: u32, #[case] expected: Duration) {
    assert_eq!(RetryPolicy::default().backoff(retry), expected);
}

#[rstest]
#[case("2", Some(Duration::from_secs(2)))]
#[case(" 7 ", Some(Duration::from_secs(7)))]
#[case("0", None)]
#[case("-1", None)]
#[case("Wed, 21 Oct 2015 07:28:00 GMT", None)]
#[case("", None)]
fn retry_after_accepts_positive_seconds_only(
    #[case] header: &str,
    #[case] expected: Option<Duration>,
) {
    assert_eq!(parse_retry_after(header), expected);
}

#[tokio::test(start_paused = true)]
async fn returns_first_success_without_retrying() {
    let sender = ScriptedSender::new();
    sender.push_status(200, "{\"ok\":true}");
    let subject = transport(&sender, RetryPolicy::default());

    let response = subject
        .execute(&get("/v2/sites/abc"), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("request should succeed: {err}"));

    assert_eq!(response.status, 200);
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn honours_retry_after_on_rate_limit() {
    let sender = ScriptedSender::new();
    sender.push_response(RawResponse::new(429, "slow down").with_retry_after(Duration::from_secs(2)));
    sender.push_status(200, "{}");
    let subject = transport(&sender, RetryPolicy::default());
    let started = Instant::now();

    let response = subject
        .execute(&get("/v2/sites/abc/redirects"), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("retry should succeed: {err}"));

    assert_eq!(response.status, 200);
    assert_eq!(sender.attempts(), 2);
    assert!(
        started.elapsed() >= Duration::from_secs(2),
        "waited only {:?}",
        started.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limit_without_header_uses_backoff() {
    let sender = ScriptedSender::new();
    sender.push_status(429, "");
    sender.push_status(204, "");
    let policy = RetryPolicy::new(3, Duration::from_secs(5), Duration::from_secs(30));
    let subject = transport(&sender, policy);
    let started = Instant::now();

    subject
        .execute(&get("/v2/sites/abc"), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("retry should succeed: {err}"));

    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn server_errors_back_off_exponentially() {
    let sender = ScriptedSender::new();
    for _ in 0..3 {
        sender.push_status(503, "unavailable");
    }
    sender.push_status(200, "{}");
    let subject = transport(&sender, RetryPolicy::default());
    let started = Instant::now();

    subject
        .execute(&get("/v2/sites/abc"), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("fourth attempt should succeed: {err}"));

    assert_eq!(sender.attempts(), 4);
    assert!(started.elapsed() >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_reports_attempts_and_last_wait() {
    let sender = ScriptedSender::new();
    for _ in 0..4 {
        sender.push_status(502, "bad gateway");
    }
    let subject = transport(&sender, RetryPolicy::default());

    let err = subject
        .execute(&get("/v2/sites/abc"), &CancellationToken::new())
        .await
        .expect_err("all attempts fail");

    let TransportError::Exhausted {
        kind,
        attempts,
        last_wait,
        cause,
        ..
    } = err
    else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(kind, FailureKind::Server(502));
    assert_eq!(attempts, 4);
    assert_eq!(last_wait, Duration::from_secs(4));
    assert!(cause.contains("bad gateway"), "cause: {cause}");
    assert_eq!(sender.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn client_errors_fail_without_retry() {
    let sender = ScriptedSender::new();
    sender.push_status(400, "{\"message\":\"bad path\"}");
    let subject = transport(&sender, RetryPolicy::default());

    let err = subject
        .execute(&get("/v2/sites/abc/redirects"), &CancellationToken::new())
        .await
        .expect_err("400 is not retryable");

    assert_eq!(err.rejected_status(), Some(400));
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejections_keep_the_whole_body() {
    let message = "x".repeat(BODY_PREVIEW_CHARS * 4);
    let body = format!("{{\"message\":\"{message}\"}}");
    let sender = ScriptedSender::new();
    sender.push_status(422, &body);
    let subject = transport(&sender, RetryPolicy::default());

    let err = subject
        .execute(&get("/v2/sites/abc/redirects"), &CancellationToken::new())
        .await
        .expect_err("422 is not retryable");

    match err {
        TransportError::Rejected { body: kept, .. } => assert_eq!(kept, body),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn network_failures_are_retried() {
    let sender = ScriptedSender::new();
    sender.push_error(SendError::network(NetworkFailure::Connect, "connection refused"));
    sender.push_error(SendError::network(NetworkFailure::Timeout, "timed out"));
    sender.push_status(200, "{}");
    let subject = transport(&sender, RetryPolicy::default());

    subject
        .execute(&get("/v2/sites/abc"), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("third attempt should succeed: {err}"));

    assert_eq!(sender.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn network_exhaustion_keeps_failure_class() {
    let sender = ScriptedSender::new();
    sender.push_error(SendError::network(NetworkFailure::Timeout, "timed out"));
    sender.push_error(SendError::network(NetworkFailure::Timeout, "timed out"));
    let subject = transport(
        &sender,
        RetryPolicy::new(1, Duration::from_millis(10), Duration::from_secs(1)),
    );

    let err = subject
        .execute(&get("/v2/sites/abc"), &CancellationToken::new())
        .await
        .expect_err("both attempts fail");

    assert!(matches!(
        err,
        TransportError::Exhausted {
            kind: FailureKind::Network(NetworkFailure::Timeout),
            attempts: 2,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_are_not_retried() {
    let sender = ScriptedSender::new();
    sender.push_error(SendError::invalid("relative URL without a base"));
    let subject = transport(&sender, RetryPolicy::default());

    let err = subject
        .execute(&get("/v2/sites/abc"), &CancellationToken::new())
        .await
        .expect_err("invalid request fails");

    assert!(matches!(err, TransportError::InvalidRequest { .. }));
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let sender = ScriptedSender::new();
    sender.push_status(503, "unavailable");
    sender.push_status(200, "{}");
    let subject = transport(
        &sender,
        RetryPolicy::new(3, Duration::from_secs(10), Duration::from_secs(30)),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });
    let started = Instant::now();

    let err = subject
        .execute(&get("/v2/sites/abc"), &cancel)
        .await
        .expect_err("cancelled during backoff");

    assert!(matches!(err, TransportError::Cancelled { attempts: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_in_flight_request() {
    let sender = ScriptedSender::new();
    sender.push_hang();
    let subject = transport(&sender, RetryPolicy::default());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = subject
        .execute(&get("/v2/sites/abc"), &cancel)
        .await
        .expect_err("cancelled while in flight");

    assert!(matches!(err, TransportError::Cancelled { attempts: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn cancelled_token_prevents_any_attempt() {
    let sender = ScriptedSender::new();
    sender.push_status(200, "{}");
    let subject = transport(&sender, RetryPolicy::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = subject
        .execute(&get("/v2/sites/abc"), &cancel)
        .await
        .expect_err("cancelled before start");

    assert!(matches!(err, TransportError::Cancelled { attempts: 0, .. }));
    assert_eq!(sender.attempts(), 0);
}

#[test]
fn request_with_json_body_serialises_payload() {
    let request = ApiRequest::with_json(
        Method::POST,
        "/v2/sites/abc/redirects",
        &serde_json::json!({"fromUrl": "/old"}),
    )
    .unwrap_or_else(|err| panic!("payload serialises: {err}"));

    assert_eq!(request.body, Some(serde_json::json!({"fromUrl": "/old"})));
}
