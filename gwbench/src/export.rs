//! Line-protocol rendering of the final snapshot for a streaming
//! time-series sink (InfluxDB-compatible: `measurement,tags fields`).
//!
//! Counters become `count` fields, latency distributions become summary
//! fields (avg/p50/p90/p95/p99/max), and everything is tagged by scenario
//! plus the run's `testid` so dashboards can segment gateway comparisons.

use std::path::Path;

use gwbench_core::runner::{MetricsSnapshot, ScenarioMetrics};

fn escape_tag(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn push_duration_fields(fields: &mut Vec<String>, m: &ScenarioMetrics) {
    let pairs = [
        ("avg", m.latency.mean_ms()),
        ("p50", m.latency.percentile_ms(50.0)),
        ("p90", m.latency.percentile_ms(90.0)),
        ("p95", m.latency.percentile_ms(95.0)),
        ("p99", m.latency.percentile_ms(99.0)),
        ("max", m.latency.max_ms()),
    ];
    for (name, value) in pairs {
        if let Some(v) = value {
            fields.push(format!("{name}={v}"));
        }
    }
    fields.push(format!("count={}u", m.latency.count()));
}

fn scenario_lines(out: &mut String, scenario: &str, testid: &str, m: &ScenarioMetrics) {
    let tags = format!("scenario={},testid={}", escape_tag(scenario), escape_tag(testid));

    out.push_str(&format!("http_reqs,{tags} count={}u\n", m.count));

    let rate = m.error_rate().unwrap_or(0.0);
    out.push_str(&format!(
        "http_req_failed,{tags} transport={}u,validation={}u,rate={rate}\n",
        m.transport_errors, m.validation_errors
    ));

    let mut fields = Vec::new();
    push_duration_fields(&mut fields, m);
    out.push_str(&format!("http_req_duration,{tags} {}\n", fields.join(",")));
}

pub fn render(snapshot: &MetricsSnapshot, testid: &str) -> String {
    let mut out = String::new();

    scenario_lines(&mut out, "all", testid, &snapshot.totals);
    for (name, metrics) in &snapshot.per_scenario {
        scenario_lines(&mut out, name, testid, metrics);
    }

    for check in &snapshot.checks {
        out.push_str(&format!(
            "checks,check={},testid={} total={}u,failed={}u\n",
            escape_tag(&check.name),
            escape_tag(testid),
            check.total,
            check.failed
        ));
    }

    out
}

pub async fn write(path: &Path, snapshot: &MetricsSnapshot, testid: &str) -> anyhow::Result<()> {
    use anyhow::Context as _;

    let body = render(snapshot, testid);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create export dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("failed to write metrics export: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_values_escape_line_protocol_specials() {
        assert_eq!(escape_tag("has robots data"), "has\\ robots\\ data");
        assert_eq!(escape_tag("a,b=c"), "a\\,b\\=c");
    }

    #[test]
    fn empty_snapshot_renders_totals_only() {
        let snapshot = MetricsSnapshot {
            totals: empty_metrics(),
            per_scenario: Default::default(),
            checks: Vec::new(),
        };

        let out = render(&snapshot, "case-rest-duration");
        assert!(out.contains("http_reqs,scenario=all,testid=case-rest-duration count=0u"));
        assert!(out.contains("http_req_failed,scenario=all"));
        // No latency samples: only the count field is rendered.
        assert!(out.contains("http_req_duration,scenario=all,testid=case-rest-duration count=0u"));
    }

    fn empty_metrics() -> ScenarioMetrics {
        // Round-trip through a fresh recorder to get an empty snapshot shape.
        gwbench_core::runner::MetricsRecorder::default()
            .snapshot()
            .totals
    }
}
