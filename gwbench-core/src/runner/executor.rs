use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{HttpClient, HttpRequest};

/// Everything needed to issue one request: wire shape plus the scenario's
/// acceptance criteria. Built fresh per invocation by the scenario's builder.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Status codes counted as success. Defaults to exactly 200.
    pub accept_status: Vec<u16>,
    pub checks: Vec<Check>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: http::Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            accept_status: vec![200],
            checks: Vec::new(),
        }
    }

    pub fn post_json(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: http::Method::POST,
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.into(),
            accept_status: vec![200],
            checks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_check(mut self, name: impl Into<Arc<str>>, test: BodyTest) -> Self {
        self.checks.push(Check {
            name: name.into(),
            test,
        });
        self
    }

    #[must_use]
    pub fn with_accept_status(mut self, statuses: Vec<u16>) -> Self {
        self.accept_status = statuses;
        self
    }
}

/// A named response-body predicate, recorded as a pass/fail check.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: Arc<str>,
    pub test: BodyTest,
}

/// Body predicate vocabulary. All JSON tests treat a body that fails to parse
/// as a failed predicate, never as an executor fault.
///
/// Pointers use JSON Pointer syntax (`/data/robots`); the empty pointer
/// addresses the document root.
#[derive(Debug, Clone)]
pub enum BodyTest {
    /// Body parses as JSON.
    JsonParses,
    /// Value at pointer exists (and is not `null`).
    JsonPointerExists(String),
    /// Value at pointer is an array with at least one element.
    JsonPointerNonEmptyArray(String),
    /// Value at pointer is an array (possibly empty).
    JsonPointerIsArray(String),
    /// Value at pointer equals the given string.
    JsonPointerEqualsStr { pointer: String, expected: String },
    /// Value at pointer is missing or `null` (e.g. no GraphQL `errors`).
    JsonPointerAbsent(String),
}

impl BodyTest {
    fn evaluate(&self, json: Option<&serde_json::Value>) -> bool {
        let Some(root) = json else {
            // Malformed body: only the "absent" test can still hold semantics,
            // but the original scripts treat parse failure as check failure.
            return false;
        };

        match self {
            BodyTest::JsonParses => true,
            BodyTest::JsonPointerExists(p) => {
                root.pointer(p).is_some_and(|v| !v.is_null())
            }
            BodyTest::JsonPointerNonEmptyArray(p) => root
                .pointer(p)
                .and_then(serde_json::Value::as_array)
                .is_some_and(|a| !a.is_empty()),
            BodyTest::JsonPointerIsArray(p) => {
                root.pointer(p).is_some_and(serde_json::Value::is_array)
            }
            BodyTest::JsonPointerEqualsStr { pointer, expected } => root
                .pointer(pointer)
                .and_then(serde_json::Value::as_str)
                .is_some_and(|s| s == expected),
            BodyTest::JsonPointerAbsent(p) => {
                root.pointer(p).is_none_or(serde_json::Value::is_null)
            }
        }
    }
}

/// Why a request failed. Transport failures never reached a usable response;
/// validation failures got a response that broke the scenario's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Validation,
}

#[derive(Debug, Clone)]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: Arc<str>,
    pub passed: bool,
}

/// Outcome of a single request. Folded into the recorder and discarded.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub scenario: Arc<str>,
    pub status: Option<u16>,
    pub latency: Duration,
    pub failure: Option<RequestFailure>,
    pub checks: Vec<CheckResult>,
}

impl RequestOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

/// Issues one HTTP request per call and resolves every failure mode into a
/// [`RequestOutcome`]; nothing escapes as an error.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: HttpClient,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// No internal retries: one call, one request, one outcome. Latency is
    /// wall-clock from dispatch to the final response byte.
    pub async fn execute(&self, scenario: Arc<str>, spec: RequestSpec) -> RequestOutcome {
        let req = HttpRequest {
            method: spec.method,
            url: spec.url,
            headers: spec.headers,
            body: spec.body,
            timeout: Some(self.timeout),
        };

        let started = Instant::now();
        let response = self.client.request(req).await;
        let latency = started.elapsed();

        let response = match response {
            Ok(res) => res,
            Err(err) => {
                let reason = match &err {
                    crate::Error::Timeout(_) => "timeout".to_string(),
                    other => format!("{}: {other}", other.transport_kind()),
                };
                return RequestOutcome {
                    scenario,
                    status: None,
                    latency,
                    failure: Some(RequestFailure {
                        kind: FailureKind::Transport,
                        reason,
                    }),
                    checks: Vec::new(),
                };
            }
        };

        let status = response.status;
        let mut failure = None;

        if !spec.accept_status.contains(&status) {
            failure = Some(RequestFailure {
                kind: FailureKind::Validation,
                reason: format!(
                    "unexpected status {status} (accepted: {:?})",
                    spec.accept_status
                ),
            });
        }

        // Parse once, lazily shared by all JSON predicates. A parse error is
        // a predicate failure, not an executor fault.
        let json: Option<serde_json::Value> = if spec.checks.is_empty() {
            None
        } else {
            serde_json::from_slice(&response.body).ok()
        };

        let mut checks = Vec::with_capacity(spec.checks.len());
        for check in &spec.checks {
            let passed = check.test.evaluate(json.as_ref());
            if !passed && failure.is_none() {
                failure = Some(RequestFailure {
                    kind: FailureKind::Validation,
                    reason: format!("check failed: {}", check.name),
                });
            }
            checks.push(CheckResult {
                name: check.name.clone(),
                passed,
            });
        }

        RequestOutcome {
            scenario,
            status: Some(status),
            latency,
            failure,
            checks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(body: &str) -> Option<serde_json::Value> {
        serde_json::from_str(body).ok()
    }

    #[test]
    fn pointer_exists_checks_non_null() {
        let v = json(r#"{"data":{"robots":[1]},"other":null}"#);
        assert!(BodyTest::JsonPointerExists("/data/robots".into()).evaluate(v.as_ref()));
        assert!(!BodyTest::JsonPointerExists("/other".into()).evaluate(v.as_ref()));
        assert!(!BodyTest::JsonPointerExists("/missing".into()).evaluate(v.as_ref()));
    }

    #[test]
    fn non_empty_array_rejects_empty_and_non_arrays() {
        let v = json(r#"{"a":[],"b":[1],"c":"x"}"#);
        assert!(!BodyTest::JsonPointerNonEmptyArray("/a".into()).evaluate(v.as_ref()));
        assert!(BodyTest::JsonPointerNonEmptyArray("/b".into()).evaluate(v.as_ref()));
        assert!(!BodyTest::JsonPointerNonEmptyArray("/c".into()).evaluate(v.as_ref()));
    }

    #[test]
    fn root_pointer_addresses_whole_document() {
        let v = json(r#"[{"id":"robot-001"}]"#);
        assert!(BodyTest::JsonPointerIsArray(String::new()).evaluate(v.as_ref()));
        assert!(BodyTest::JsonPointerNonEmptyArray(String::new()).evaluate(v.as_ref()));
    }

    #[test]
    fn absent_accepts_missing_and_null() {
        let v = json(r#"{"data":{},"errors":null}"#);
        assert!(BodyTest::JsonPointerAbsent("/errors".into()).evaluate(v.as_ref()));
        assert!(BodyTest::JsonPointerAbsent("/nope".into()).evaluate(v.as_ref()));

        let with_errors = json(r#"{"errors":[{"message":"boom"}]}"#);
        assert!(!BodyTest::JsonPointerAbsent("/errors".into()).evaluate(with_errors.as_ref()));
    }

    #[test]
    fn malformed_body_fails_every_json_predicate() {
        let v = json("{not json");
        assert!(v.is_none());
        assert!(!BodyTest::JsonParses.evaluate(v.as_ref()));
        assert!(!BodyTest::JsonPointerExists("/x".into()).evaluate(v.as_ref()));
        assert!(!BodyTest::JsonPointerAbsent("/errors".into()).evaluate(v.as_ref()));
    }

    #[test]
    fn equals_str_matches_exactly() {
        let v = json(r#"{"id":"robot-007"}"#);
        assert!(
            BodyTest::JsonPointerEqualsStr {
                pointer: "/id".into(),
                expected: "robot-007".into()
            }
            .evaluate(v.as_ref())
        );
        assert!(
            !BodyTest::JsonPointerEqualsStr {
                pointer: "/id".into(),
                expected: "robot-008".into()
            }
            .evaluate(v.as_ref())
        );
    }
}
