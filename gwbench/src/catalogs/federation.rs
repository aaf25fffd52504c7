//! Federated GraphQL router: serves GraphQL at the root path, entity fields
//! resolved across subgraphs. The critical-alerts query is intentionally
//! flatter than the stitched one (the federated Alert type does not expose
//! robot/telemetry fields).

use gwbench_core::runner::{BodyTest, RequestSpec, ScenarioDefinition};
use serde_json::json;

use super::{
    WEIGHT_CRITICAL_ALERTS, WEIGHT_FLEET_DASHBOARD, WEIGHT_ROBOT_MONITOR, random_robot_id,
};

const FLEET_QUERY: &str = "\
query FleetDashboard {
  robots {
    id
    name
    status
    latestTelemetry { batteryLevel cpuUsage temperature }
    activeAlerts { severity message }
  }
}";

const ROBOT_MONITOR_QUERY: &str = "\
query RobotMonitor($id: ID!) {
  robot(id: $id) {
    id
    name
    status
    model
    location
    latestTelemetry { batteryLevel cpuUsage temperature timestamp }
    activeAlerts { severity message createdAt }
  }
}";

const CRITICAL_QUERY: &str = "\
query CriticalAlerts {
  criticalAlerts {
    id
    robotId
    severity
    message
    createdAt
  }
}";

pub fn scenarios(base: &str) -> Vec<ScenarioDefinition> {
    // The router answers at the base URL itself; hyper needs a path.
    let endpoint = format!("{base}/");
    let fleet_endpoint = endpoint.clone();
    let monitor_endpoint = endpoint.clone();
    let critical_endpoint = endpoint;

    vec![
        ScenarioDefinition::new("fleet_dashboard", WEIGHT_FLEET_DASHBOARD, move |_| {
            let body = json!({ "query": FLEET_QUERY }).to_string();
            RequestSpec::post_json(fleet_endpoint.clone(), body)
                .with_check(
                    "has data",
                    BodyTest::JsonPointerIsArray("/data/robots".to_string()),
                )
                .with_check("no errors", BodyTest::JsonPointerAbsent("/errors".to_string()))
        }),
        ScenarioDefinition::new("robot_monitor", WEIGHT_ROBOT_MONITOR, move |ctx| {
            let robot_id = random_robot_id(ctx.rng);
            let body = json!({
                "query": ROBOT_MONITOR_QUERY,
                "variables": { "id": robot_id },
            })
            .to_string();
            RequestSpec::post_json(monitor_endpoint.clone(), body)
                .with_check(
                    "has data",
                    BodyTest::JsonPointerExists("/data/robot".to_string()),
                )
                .with_check("no errors", BodyTest::JsonPointerAbsent("/errors".to_string()))
        }),
        ScenarioDefinition::new("critical_alerts", WEIGHT_CRITICAL_ALERTS, move |_| {
            let body = json!({ "query": CRITICAL_QUERY }).to_string();
            RequestSpec::post_json(critical_endpoint.clone(), body)
                .with_check(
                    "has data",
                    BodyTest::JsonPointerIsArray("/data/criticalAlerts".to_string()),
                )
                .with_check("no errors", BodyTest::JsonPointerAbsent("/errors".to_string()))
        }),
    ]
}
