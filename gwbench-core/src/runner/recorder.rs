use dashmap::DashMap;
use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::executor::{FailureKind, RequestOutcome};

fn new_hist() -> Histogram<u64> {
    // Track up to 60s in microseconds (with 3 sigfigs).
    Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)
        .unwrap_or_else(|err| panic!("failed to init histogram: {err}"))
}

#[derive(Debug)]
struct ScenarioStats {
    count: AtomicU64,
    transport_errors: AtomicU64,
    validation_errors: AtomicU64,
    latency_us: Mutex<Histogram<u64>>,
}

impl Default for ScenarioStats {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            latency_us: Mutex::new(new_hist()),
        }
    }
}

impl ScenarioStats {
    fn record(&self, outcome: &RequestOutcome) {
        self.count.fetch_add(1, Ordering::Relaxed);
        match outcome.failure.as_ref().map(|f| f.kind) {
            Some(FailureKind::Transport) => {
                self.transport_errors.fetch_add(1, Ordering::Relaxed);
            }
            Some(FailureKind::Validation) => {
                self.validation_errors.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }

        let us = outcome.latency.as_micros();
        if us != 0 {
            let mut h = self
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let _ = h.record(us as u64);
        }
    }

    fn snapshot(&self) -> ScenarioMetrics {
        let hist = {
            let h = self
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            h.clone()
        };

        ScenarioMetrics {
            count: self.count.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            validation_errors: self.validation_errors.load(Ordering::Relaxed),
            latency: LatencyStats { hist },
        }
    }
}

#[derive(Debug, Default)]
struct CheckCounters {
    total: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time latency distribution. Percentile queries use hdrhistogram's
/// `value_at_quantile` (highest recorded value at or below the quantile rank,
/// a nearest-rank flavor), which is monotonic in p.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    hist: Histogram<u64>,
}

impl LatencyStats {
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    pub fn mean_ms(&self) -> Option<f64> {
        if self.hist.is_empty() {
            return None;
        }
        Some(self.hist.mean() / 1000.0)
    }

    pub fn max_ms(&self) -> Option<f64> {
        if self.hist.is_empty() {
            return None;
        }
        Some(self.hist.max() as f64 / 1000.0)
    }

    /// `p` in (0, 100]. Returns None for an empty distribution.
    pub fn percentile_ms(&self, p: f64) -> Option<f64> {
        if self.hist.is_empty() {
            return None;
        }
        Some(self.hist.value_at_quantile(p / 100.0) as f64 / 1000.0)
    }
}

/// Aggregates for one scenario tag (or the run totals).
#[derive(Debug, Clone)]
pub struct ScenarioMetrics {
    pub count: u64,
    pub transport_errors: u64,
    pub validation_errors: u64,
    pub latency: LatencyStats,
}

impl ScenarioMetrics {
    pub fn error_count(&self) -> u64 {
        self.transport_errors + self.validation_errors
    }

    pub fn error_rate(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.error_count() as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone)]
pub struct CheckSummary {
    pub name: String,
    pub total: u64,
    pub failed: u64,
}

/// Immutable point-in-time copy of all recorded aggregates. Safe to read
/// without synchronization.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub totals: ScenarioMetrics,
    pub per_scenario: BTreeMap<String, ScenarioMetrics>,
    pub checks: Vec<CheckSummary>,
}

impl MetricsSnapshot {
    pub fn checks_total(&self) -> u64 {
        self.checks.iter().map(|c| c.total).sum()
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks.iter().map(|c| c.failed).sum()
    }
}

/// Concurrent outcome accumulator shared by all virtual users.
///
/// Counters are atomics and latency goes into per-scenario histograms, so
/// `record` is safe from any task without external locking and memory stays
/// near-constant in request volume. Individual outcomes are not retained.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    totals: ScenarioStats,
    per_scenario: DashMap<Arc<str>, Arc<ScenarioStats>>,
    checks: DashMap<Arc<str>, Arc<CheckCounters>>,
}

impl MetricsRecorder {
    /// Fold one outcome into the totals and its scenario's aggregates.
    pub fn record(&self, outcome: &RequestOutcome) {
        self.totals.record(outcome);

        let stats = self
            .per_scenario
            .entry(outcome.scenario.clone())
            .or_default()
            .clone();
        stats.record(outcome);

        for check in &outcome.checks {
            let counters = self
                .checks
                .entry(check.name.clone())
                .or_default()
                .clone();
            counters.total.fetch_add(1, Ordering::Relaxed);
            if !check.passed {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.totals.count.load(Ordering::Relaxed)
    }

    pub fn failed_total(&self) -> u64 {
        self.totals.transport_errors.load(Ordering::Relaxed)
            + self.totals.validation_errors.load(Ordering::Relaxed)
    }

    /// Latency percentile over the totals so far, for live progress output.
    pub fn latency_percentile_ms(&self, p: f64) -> Option<f64> {
        let h = self
            .totals
            .latency_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if h.is_empty() {
            return None;
        }
        Some(h.value_at_quantile(p / 100.0) as f64 / 1000.0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let per_scenario = self
            .per_scenario
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().snapshot()))
            .collect();

        let mut checks: Vec<CheckSummary> = self
            .checks
            .iter()
            .map(|entry| CheckSummary {
                name: entry.key().to_string(),
                total: entry.value().total.load(Ordering::Relaxed),
                failed: entry.value().failed.load(Ordering::Relaxed),
            })
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));

        MetricsSnapshot {
            totals: self.totals.snapshot(),
            per_scenario,
            checks,
        }
    }
}

/// Convenience constructor for test recording paths.
#[cfg(test)]
pub(crate) fn outcome_ok(scenario: &Arc<str>, latency: Duration) -> RequestOutcome {
    RequestOutcome {
        scenario: scenario.clone(),
        status: Some(200),
        latency,
        failure: None,
        checks: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::executor::RequestFailure;

    fn outcome_failed(scenario: &Arc<str>, kind: FailureKind) -> RequestOutcome {
        RequestOutcome {
            scenario: scenario.clone(),
            status: Some(500),
            latency: Duration::from_millis(5),
            failure: Some(RequestFailure {
                kind,
                reason: "test".to_string(),
            }),
            checks: Vec::new(),
        }
    }

    #[test]
    fn record_splits_transport_and_validation_errors() {
        let recorder = MetricsRecorder::default();
        let scenario: Arc<str> = Arc::from("s");

        recorder.record(&outcome_ok(&scenario, Duration::from_millis(10)));
        recorder.record(&outcome_failed(&scenario, FailureKind::Transport));
        recorder.record(&outcome_failed(&scenario, FailureKind::Validation));
        recorder.record(&outcome_failed(&scenario, FailureKind::Validation));

        let snap = recorder.snapshot();
        assert_eq!(snap.totals.count, 4);
        assert_eq!(snap.totals.transport_errors, 1);
        assert_eq!(snap.totals.validation_errors, 2);
        assert_eq!(snap.totals.error_count(), 3);

        let s = &snap.per_scenario["s"];
        assert_eq!(s.count, 4);
        assert_eq!(s.transport_errors, 1);
        assert_eq!(s.validation_errors, 2);
    }

    #[test]
    fn snapshot_is_detached_from_further_recording() {
        let recorder = MetricsRecorder::default();
        let scenario: Arc<str> = Arc::from("s");

        recorder.record(&outcome_ok(&scenario, Duration::from_millis(10)));
        let snap = recorder.snapshot();
        recorder.record(&outcome_ok(&scenario, Duration::from_millis(10)));

        assert_eq!(snap.totals.count, 1);
        assert_eq!(recorder.snapshot().totals.count, 2);
    }

    #[test]
    fn percentiles_are_monotonic_in_p() {
        let recorder = MetricsRecorder::default();
        let scenario: Arc<str> = Arc::from("s");
        for ms in 1..=1000u64 {
            recorder.record(&outcome_ok(&scenario, Duration::from_millis(ms)));
        }

        let snap = recorder.snapshot();
        let mut last = 0.0f64;
        for p in [1.0, 10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0, 100.0] {
            let v = snap
                .totals
                .latency
                .percentile_ms(p)
                .unwrap_or_else(|| panic!("missing percentile {p}"));
            assert!(v >= last, "p({p}) = {v} < previous {last}");
            last = v;
        }
    }

    #[test]
    fn concurrent_recording_loses_no_updates() {
        let recorder = Arc::new(MetricsRecorder::default());
        let scenario: Arc<str> = Arc::from("contended");

        let mut handles = Vec::new();
        for _ in 0..50 {
            let recorder = recorder.clone();
            let scenario = scenario.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    recorder.record(&outcome_ok(&scenario, Duration::from_millis(3)));
                }
            }));
        }
        for h in handles {
            h.join().unwrap_or_else(|_| panic!("recorder thread panicked"));
        }

        let snap = recorder.snapshot();
        assert_eq!(snap.totals.count, 50_000);
        assert_eq!(snap.totals.error_count(), 0);
        assert_eq!(snap.per_scenario["contended"].count, 50_000);
        assert_eq!(snap.totals.latency.count(), 50_000);
    }

    #[test]
    fn check_counters_accumulate_by_name() {
        let recorder = MetricsRecorder::default();
        let scenario: Arc<str> = Arc::from("s");

        let mut outcome = outcome_ok(&scenario, Duration::from_millis(1));
        outcome.checks = vec![
            crate::runner::CheckResult {
                name: Arc::from("status is 200"),
                passed: true,
            },
            crate::runner::CheckResult {
                name: Arc::from("has robots data"),
                passed: false,
            },
        ];
        recorder.record(&outcome);
        recorder.record(&outcome);

        let snap = recorder.snapshot();
        assert_eq!(snap.checks_total(), 4);
        assert_eq!(snap.checks_failed(), 2);
        let failed = snap
            .checks
            .iter()
            .find(|c| c.name == "has robots data")
            .unwrap_or_else(|| panic!("missing check"));
        assert_eq!(failed.failed, 2);
    }
}
