use std::sync::Arc;
use std::time::Duration;

/// Live counters pushed to the progress observer once per second.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub tick: u64,
    pub elapsed: Duration,
    pub requests_total: u64,
    pub failed_total: u64,
    /// Requests completed during the last tick interval, per second.
    pub rps_now: f64,
    pub latency_p50_ms: Option<f64>,
    pub latency_p95_ms: Option<f64>,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;
