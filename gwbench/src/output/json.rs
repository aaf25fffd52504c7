use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use gwbench_core::runner::{
    ProgressFn, ProgressUpdate, RunReport, ScenarioMetrics, ThresholdReport,
};

use super::{OutputFormatter, RunHeader};

pub(crate) struct JsonOutput;

fn emit_json_line<T: Serialize>(line: &T) {
    let mut stdout = std::io::stdout().lock();
    if serde_json::to_writer(&mut stdout, line).is_ok() {
        let _ = stdout.write_all(b"\n");
    }
}

#[derive(Debug, Serialize)]
struct JsonHeaderLine<'a> {
    kind: &'static str,
    gateway: &'a str,
    target_url: &'a str,
    mode: &'a str,
    concurrency: u64,
}

#[derive(Debug, Serialize)]
struct JsonProgressLine {
    kind: &'static str,
    tick: u64,
    elapsed_secs: u64,
    requests_total: u64,
    failed_total: u64,
    rps_now: f64,
    latency_p50_ms: Option<f64>,
    latency_p95_ms: Option<f64>,
}

#[derive(Debug, Serialize)]
struct JsonScenarioSummary {
    requests_total: u64,
    failed_total: u64,
    transport_errors: u64,
    validation_errors: u64,
    latency_p50_ms: Option<f64>,
    latency_p95_ms: Option<f64>,
    latency_p99_ms: Option<f64>,
    latency_mean_ms: Option<f64>,
    latency_max_ms: Option<f64>,
}

#[derive(Debug, Serialize)]
struct JsonCheckSummary {
    name: String,
    total: u64,
    failed: u64,
}

#[derive(Debug, Serialize)]
struct JsonThresholdResult {
    rule: String,
    /// NaN serializes as null: a rule that saw no data has no observed value.
    observed: Option<f64>,
    pass: bool,
}

#[derive(Debug, Serialize)]
struct JsonSummaryLine {
    kind: &'static str,
    elapsed_ms: u64,
    totals: JsonScenarioSummary,
    scenarios: BTreeMap<String, JsonScenarioSummary>,
    checks: Vec<JsonCheckSummary>,
    thresholds: Vec<JsonThresholdResult>,
    overall_pass: bool,
}

fn scenario_summary(m: &ScenarioMetrics) -> JsonScenarioSummary {
    JsonScenarioSummary {
        requests_total: m.count,
        failed_total: m.error_count(),
        transport_errors: m.transport_errors,
        validation_errors: m.validation_errors,
        latency_p50_ms: m.latency.percentile_ms(50.0),
        latency_p95_ms: m.latency.percentile_ms(95.0),
        latency_p99_ms: m.latency.percentile_ms(99.0),
        latency_mean_ms: m.latency.mean_ms(),
        latency_max_ms: m.latency.max_ms(),
    }
}

impl OutputFormatter for JsonOutput {
    fn print_header(&self, header: &RunHeader) {
        emit_json_line(&JsonHeaderLine {
            kind: "header",
            gateway: header.gateway,
            target_url: &header.target_url,
            mode: &header.mode,
            concurrency: header.concurrency,
        });
    }

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(|u: ProgressUpdate| {
            emit_json_line(&JsonProgressLine {
                kind: "progress",
                tick: u.tick,
                elapsed_secs: u.elapsed.as_secs(),
                requests_total: u.requests_total,
                failed_total: u.failed_total,
                rps_now: u.rps_now,
                latency_p50_ms: u.latency_p50_ms,
                latency_p95_ms: u.latency_p95_ms,
            });
        }))
    }

    fn print_summary(
        &self,
        report: &RunReport,
        thresholds: &ThresholdReport,
    ) -> anyhow::Result<()> {
        let snap = &report.snapshot;

        let line = JsonSummaryLine {
            kind: "summary",
            elapsed_ms: report.elapsed.as_millis() as u64,
            totals: scenario_summary(&snap.totals),
            scenarios: snap
                .per_scenario
                .iter()
                .map(|(name, m)| (name.clone(), scenario_summary(m)))
                .collect(),
            checks: snap
                .checks
                .iter()
                .map(|c| JsonCheckSummary {
                    name: c.name.clone(),
                    total: c.total,
                    failed: c.failed,
                })
                .collect(),
            thresholds: thresholds
                .rules
                .iter()
                .map(|r| JsonThresholdResult {
                    rule: r.rule.to_string(),
                    observed: if r.observed.is_nan() {
                        None
                    } else {
                        Some(r.observed)
                    },
                    pass: r.pass,
                })
                .collect(),
            overall_pass: thresholds.overall_pass(),
        };

        emit_json_line(&line);
        Ok(())
    }
}
