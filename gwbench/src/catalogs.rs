//! Built-in scenario catalogs, one per gateway style.
//!
//! All three carry the same request mix — `fleet_dashboard` (0.5),
//! `robot_monitor` (0.3), `critical_alerts` (0.2) — so runs against different
//! gateways stay comparable. The engine itself knows nothing about robots or
//! alerts; everything gateway-specific lives here as catalog data.

use gwbench_core::runner::ScenarioDefinition;
use rand::Rng as _;
use rand::rngs::StdRng;

use crate::cli::GatewayArg;

mod federation;
mod rest;
mod stitching;

pub const WEIGHT_FLEET_DASHBOARD: f64 = 0.5;
pub const WEIGHT_ROBOT_MONITOR: f64 = 0.3;
pub const WEIGHT_CRITICAL_ALERTS: f64 = 0.2;

pub fn scenarios(gateway: GatewayArg, base_url: &str) -> Vec<ScenarioDefinition> {
    let base = base_url.trim_end_matches('/').to_string();
    match gateway {
        GatewayArg::Rest => rest::scenarios(&base),
        GatewayArg::Stitching => stitching::scenarios(&base),
        GatewayArg::Federation => federation::scenarios(&base),
    }
}

/// Uniform robot id in the seeded fleet range, `robot-001` .. `robot-015`.
fn random_robot_id(rng: &mut StdRng) -> String {
    let num: u32 = rng.gen_range(1..=15);
    format!("robot-{num:03}")
}
