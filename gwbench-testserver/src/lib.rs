//! Mock gateway used by gwbench tests.
//!
//! Serves the REST surface of the original gateway (`/api/...`), a
//! schema-stitching style `/graphql` endpoint, and a federation-style root
//! endpoint, plus a few routes for exercising failure paths.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_FLEET_DASHBOARD: &str = "/api/fleet/dashboard";
pub const PATH_CRITICAL_ALERTS: &str = "/api/alerts/critical";
pub const PATH_GRAPHQL: &str = "/graphql";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_BROKEN: &str = "/broken";
pub const PATH_GARBAGE: &str = "/garbage";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    rest_requests: Arc<AtomicU64>,
    graphql_requests: Arc<AtomicU64>,
    federation_requests: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_rest(&self) {
        self.inc_requests_total();
        self.rest_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_graphql(&self) {
        self.inc_requests_total();
        self.graphql_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_federation(&self) {
        self.inc_requests_total();
        self.federation_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn rest_requests(&self) -> u64 {
        self.rest_requests.load(Ordering::Relaxed)
    }

    pub fn graphql_requests(&self) -> u64 {
        self.graphql_requests.load(Ordering::Relaxed)
    }

    pub fn federation_requests(&self) -> u64 {
        self.federation_requests.load(Ordering::Relaxed)
    }
}

fn robot(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Unit {id}"),
        "status": "active",
        "model": "AX-9",
        "location": "bay-1",
        "latestTelemetry": {
            "batteryLevel": 87.5,
            "cpuUsage": 12.0,
            "temperature": 36.6,
            "timestamp": "2024-01-01T00:00:00Z",
        },
        "activeAlerts": [
            { "severity": "warning", "message": "battery below 90%", "createdAt": "2024-01-01T00:00:00Z" },
        ],
    })
}

fn fleet() -> Vec<Value> {
    (1..=15).map(|n| robot(&format!("robot-{n:03}"))).collect()
}

async fn handle_fleet_dashboard(State(stats): State<TestServerStats>) -> axum::Json<Value> {
    stats.inc_rest();
    axum::Json(Value::Array(fleet()))
}

async fn handle_robot_monitor(
    State(stats): State<TestServerStats>,
    Path(id): Path<String>,
) -> axum::Json<Value> {
    stats.inc_rest();
    axum::Json(robot(&id))
}

async fn handle_critical_alerts(State(stats): State<TestServerStats>) -> axum::Json<Value> {
    stats.inc_rest();
    axum::Json(json!([
        {
            "id": "alert-001",
            "robotId": "robot-003",
            "severity": "critical",
            "message": "motor overheating",
            "createdAt": "2024-01-01T00:00:00Z",
            "robot": { "name": "Unit robot-003", "location": "bay-1" },
            "telemetrySnapshot": { "batteryLevel": 21.0, "cpuUsage": 96.0, "temperature": 81.2 },
        },
    ]))
}

#[derive(Debug, serde::Deserialize)]
struct GraphqlRequest {
    query: String,
    #[serde(default)]
    variables: HashMap<String, Value>,
}

fn graphql_data(req: &GraphqlRequest) -> Value {
    let robot_id = req
        .variables
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("robot-001");

    if req.query.contains("fleetDashboard") {
        json!({ "fleetDashboard": { "robots": fleet() } })
    } else if req.query.contains("robotMonitor") {
        json!({
            "robotMonitor": {
                "robot": robot(robot_id),
                "telemetry": robot(robot_id)["latestTelemetry"].clone(),
                "recentAlerts": [],
            }
        })
    } else if req.query.contains("criticalAlerts") {
        json!({
            "criticalAlerts": [
                { "id": "alert-001", "robotId": "robot-003", "severity": "critical",
                  "message": "motor overheating", "createdAt": "2024-01-01T00:00:00Z",
                  "robot": { "name": "Unit robot-003", "location": "bay-1" },
                  "telemetrySnapshot": { "batteryLevel": 21.0, "cpuUsage": 96.0, "temperature": 81.2 } },
            ]
        })
    } else if req.query.contains("robot(") {
        json!({ "robot": robot(robot_id) })
    } else if req.query.contains("robots") {
        json!({ "robots": fleet() })
    } else {
        json!({})
    }
}

async fn handle_graphql(
    State(stats): State<TestServerStats>,
    body: Bytes,
) -> (StatusCode, axum::Json<Value>) {
    stats.inc_graphql();
    graphql_response(&body)
}

async fn handle_federation(
    State(stats): State<TestServerStats>,
    body: Bytes,
) -> (StatusCode, axum::Json<Value>) {
    stats.inc_federation();
    graphql_response(&body)
}

fn graphql_response(body: &Bytes) -> (StatusCode, axum::Json<Value>) {
    let req: GraphqlRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::OK,
                axum::Json(json!({ "errors": [{ "message": "invalid request body" }] })),
            );
        }
    };

    (
        StatusCode::OK,
        axum::Json(json!({ "data": graphql_data(&req) })),
    )
}

async fn handle_slow(State(stats): State<TestServerStats>) -> &'static str {
    stats.inc_requests_total();
    sleep(Duration::from_millis(500)).await;
    "slow"
}

async fn handle_broken(State(stats): State<TestServerStats>) -> (StatusCode, &'static str) {
    stats.inc_requests_total();
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn handle_garbage(State(stats): State<TestServerStats>) -> (StatusCode, &'static str) {
    stats.inc_requests_total();
    (StatusCode::OK, "{not-json")
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_FLEET_DASHBOARD, get(handle_fleet_dashboard))
        .route("/api/robots/{id}/monitor", get(handle_robot_monitor))
        .route(PATH_CRITICAL_ALERTS, get(handle_critical_alerts))
        .route(PATH_GRAPHQL, post(handle_graphql))
        .route("/", post(handle_federation))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_BROKEN, get(handle_broken))
        .route(PATH_GARBAGE, get(handle_garbage))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");

        Ok(Self {
            addr,
            base_url,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
