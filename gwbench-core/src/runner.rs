mod catalog;
mod config;
mod error;
mod executor;
mod gate;
mod progress;
mod recorder;
mod run;
mod thresholds;

pub use catalog::{BuildContext, ScenarioCatalog, ScenarioDefinition};
pub use config::{RunConfig, RunMode};
pub use error::{Error, Result};
pub use executor::{
    BodyTest, Check, CheckResult, FailureKind, RequestExecutor, RequestFailure, RequestOutcome,
    RequestSpec,
};
pub use gate::IterationGate;
pub use progress::{ProgressFn, ProgressUpdate};
pub use recorder::{
    CheckSummary, LatencyStats, MetricsRecorder, MetricsSnapshot, ScenarioMetrics,
};
pub use run::{RunController, RunHooks, RunReport, RunState, StopHandle};
pub use thresholds::{
    MetricSelector, RuleOutcome, ThresholdAgg, ThresholdExpr, ThresholdOp, ThresholdReport,
    ThresholdRule, evaluate_thresholds, parse_threshold_rule,
};
