use std::sync::Arc;
use std::time::Duration;

use gwbench_core::HttpClient;
use gwbench_core::runner::{BodyTest, FailureKind, RequestExecutor, RequestSpec};
use gwbench_testserver::TestServer;

fn executor(timeout: Duration) -> RequestExecutor {
    RequestExecutor::new(HttpClient::default(), timeout)
}

#[tokio::test]
async fn ok_response_with_passing_predicates_succeeds() {
    let server = TestServer::start().await.unwrap_or_else(|e| panic!("{e}"));
    let scenario: Arc<str> = Arc::from("fleet_dashboard");

    let spec = RequestSpec::get(format!("{}/api/fleet/dashboard", server.base_url()))
        .with_check("status is 200", BodyTest::JsonParses)
        .with_check(
            "has robots data",
            BodyTest::JsonPointerNonEmptyArray(String::new()),
        );

    let outcome = executor(Duration::from_secs(5))
        .execute(scenario, spec)
        .await;
    server.shutdown().await;

    assert!(outcome.succeeded(), "failure: {:?}", outcome.failure);
    assert_eq!(outcome.status, Some(200));
    assert!(outcome.checks.iter().all(|c| c.passed));
    assert!(outcome.latency > Duration::ZERO);
}

#[tokio::test]
async fn server_error_is_a_validation_failure_with_status_reason() {
    let server = TestServer::start().await.unwrap_or_else(|e| panic!("{e}"));
    let scenario: Arc<str> = Arc::from("broken");

    let spec = RequestSpec::get(format!("{}/broken", server.base_url()));
    let outcome = executor(Duration::from_secs(5))
        .execute(scenario, spec)
        .await;
    server.shutdown().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.status, Some(500));
    let failure = outcome.failure.unwrap_or_else(|| panic!("expected failure"));
    assert_eq!(failure.kind, FailureKind::Validation);
    assert!(
        failure.reason.contains("status 500"),
        "reason: {}",
        failure.reason
    );
}

#[tokio::test]
async fn timeout_is_a_transport_failure_named_timeout() {
    let server = TestServer::start().await.unwrap_or_else(|e| panic!("{e}"));
    let scenario: Arc<str> = Arc::from("slow");

    // /slow sleeps 500ms; a 50ms budget forces the timeout path.
    let spec = RequestSpec::get(format!("{}/slow", server.base_url()));
    let outcome = executor(Duration::from_millis(50))
        .execute(scenario, spec)
        .await;
    server.shutdown().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.status, None);
    let failure = outcome.failure.unwrap_or_else(|| panic!("expected failure"));
    assert_eq!(failure.kind, FailureKind::Transport);
    assert_eq!(failure.reason, "timeout");
}

#[tokio::test]
async fn connection_refused_is_a_transport_failure() {
    let scenario: Arc<str> = Arc::from("unreachable");

    // Nothing listens on this port (reserved but unbound).
    let spec = RequestSpec::get("http://127.0.0.1:9/none");
    let outcome = executor(Duration::from_secs(2))
        .execute(scenario, spec)
        .await;

    assert!(!outcome.succeeded());
    let failure = outcome.failure.unwrap_or_else(|| panic!("expected failure"));
    assert_eq!(failure.kind, FailureKind::Transport);
}

#[tokio::test]
async fn malformed_body_fails_predicates_without_crashing() {
    let server = TestServer::start().await.unwrap_or_else(|e| panic!("{e}"));
    let scenario: Arc<str> = Arc::from("garbage");

    let spec = RequestSpec::get(format!("{}/garbage", server.base_url()))
        .with_check("body is json", BodyTest::JsonParses);
    let outcome = executor(Duration::from_secs(5))
        .execute(scenario, spec)
        .await;
    server.shutdown().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.status, Some(200));
    let failure = outcome.failure.unwrap_or_else(|| panic!("expected failure"));
    assert_eq!(failure.kind, FailureKind::Validation);
    assert!(
        failure.reason.contains("body is json"),
        "reason: {}",
        failure.reason
    );
    assert_eq!(outcome.checks.len(), 1);
    assert!(!outcome.checks[0].passed);
}

#[tokio::test]
async fn graphql_post_round_trip_matches_predicates() {
    let server = TestServer::start().await.unwrap_or_else(|e| panic!("{e}"));
    let scenario: Arc<str> = Arc::from("fleet_dashboard");

    let body = serde_json::json!({
        "query": "query FleetDashboard { fleetDashboard { robots { id } } }",
    })
    .to_string();

    let spec = RequestSpec::post_json(format!("{}/graphql", server.base_url()), body)
        .with_check(
            "has data",
            BodyTest::JsonPointerNonEmptyArray("/data/fleetDashboard/robots".to_string()),
        )
        .with_check("no errors", BodyTest::JsonPointerAbsent("/errors".to_string()));

    let outcome = executor(Duration::from_secs(5))
        .execute(scenario, spec)
        .await;
    server.shutdown().await;

    assert!(outcome.succeeded(), "failure: {:?}", outcome.failure);
}
