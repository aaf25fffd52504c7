use std::sync::Arc;

use gwbench_core::runner::{ProgressFn, RunReport, ScenarioMetrics, ThresholdReport};

use super::{OutputFormatter, RunHeader};

pub(crate) struct HumanReadableOutput;

fn fmt_ms(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.1}ms"),
        None => "-".to_string(),
    }
}

fn scenario_line(name: &str, m: &ScenarioMetrics) -> String {
    format!(
        "  {name:<18} reqs={:<7} failed={:<5} (transport={}, validation={})  p50={} p95={} p99={} max={}",
        m.count,
        m.error_count(),
        m.transport_errors,
        m.validation_errors,
        fmt_ms(m.latency.percentile_ms(50.0)),
        fmt_ms(m.latency.percentile_ms(95.0)),
        fmt_ms(m.latency.percentile_ms(99.0)),
        fmt_ms(m.latency.max_ms()),
    )
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, header: &RunHeader) {
        eprintln!(
            "gwbench: gateway={} target={} mode={} concurrency={}",
            header.gateway, header.target_url, header.mode, header.concurrency
        );
    }

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(|u| {
            eprintln!(
                "[{:>4}s] reqs={} failed={} rps={:.1} p50={} p95={}",
                u.elapsed.as_secs(),
                u.requests_total,
                u.failed_total,
                u.rps_now,
                fmt_ms(u.latency_p50_ms),
                fmt_ms(u.latency_p95_ms),
            );
        }))
    }

    fn print_summary(
        &self,
        report: &RunReport,
        thresholds: &ThresholdReport,
    ) -> anyhow::Result<()> {
        let snap = &report.snapshot;
        let totals = &snap.totals;

        println!();
        println!(
            "run complete in {} ({} requests, {:.1} req/s)",
            humantime::format_duration(std::time::Duration::from_millis(
                report.elapsed.as_millis() as u64
            )),
            totals.count,
            totals.count as f64 / report.elapsed.as_secs_f64().max(1e-9),
        );
        println!("{}", scenario_line("totals", totals));

        if !snap.per_scenario.is_empty() {
            println!("scenarios:");
            for (name, metrics) in &snap.per_scenario {
                println!("{}", scenario_line(name, metrics));
            }
        }

        let failing_checks: Vec<_> = snap.checks.iter().filter(|c| c.failed > 0).collect();
        if !failing_checks.is_empty() {
            println!("failed checks:");
            for check in failing_checks {
                println!("  {:<28} {}/{} failed", check.name, check.failed, check.total);
            }
        }

        println!("thresholds:");
        for rule in &thresholds.rules {
            let mark = if rule.pass { "ok  " } else { "FAIL" };
            println!("  {mark} {}  observed={}", rule.rule, rule.observed);
        }

        Ok(())
    }
}
