//! REST aggregation gateway: plain GET endpoints, JSON responses.

use gwbench_core::runner::{BodyTest, RequestSpec, ScenarioDefinition};

use super::{
    WEIGHT_CRITICAL_ALERTS, WEIGHT_FLEET_DASHBOARD, WEIGHT_ROBOT_MONITOR, random_robot_id,
};

pub fn scenarios(base: &str) -> Vec<ScenarioDefinition> {
    let fleet_url = format!("{base}/api/fleet/dashboard");
    let alerts_url = format!("{base}/api/alerts/critical");
    let monitor_base = base.to_string();

    vec![
        ScenarioDefinition::new("fleet_dashboard", WEIGHT_FLEET_DASHBOARD, move |_| {
            RequestSpec::get(fleet_url.clone()).with_check(
                "has robots data",
                BodyTest::JsonPointerNonEmptyArray(String::new()),
            )
        }),
        ScenarioDefinition::new("robot_monitor", WEIGHT_ROBOT_MONITOR, move |ctx| {
            let robot_id = random_robot_id(ctx.rng);
            let url = format!("{monitor_base}/api/robots/{robot_id}/monitor");
            RequestSpec::get(url).with_check(
                "has robot data",
                BodyTest::JsonPointerEqualsStr {
                    pointer: "/id".to_string(),
                    expected: robot_id,
                },
            )
        }),
        ScenarioDefinition::new("critical_alerts", WEIGHT_CRITICAL_ALERTS, move |_| {
            RequestSpec::get(alerts_url.clone()).with_check(
                "has alerts data",
                BodyTest::JsonPointerIsArray(String::new()),
            )
        }),
    ]
}
