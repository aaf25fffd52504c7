use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    let unit = unit_str.trim();
    match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Run until a wall-clock deadline elapses.
    Duration,
    /// Run exactly N iterations in aggregate across all virtual users.
    Iterations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GatewayArg {
    /// Plain REST aggregation gateway (GET endpoints).
    Rest,
    /// Schema-stitching GraphQL gateway (POST {base}/graphql).
    Stitching,
    /// Federated GraphQL router (POST {base}).
    Federation,
}

impl GatewayArg {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayArg::Rest => "rest",
            GatewayArg::Stitching => "stitching",
            GatewayArg::Federation => "federation",
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "gwbench",
    author,
    version,
    about = "Load-generation harness for comparing API gateway styles",
    long_about = "gwbench drives identical weighted request mixes against three functionally equivalent API gateways (REST aggregation, schema-stitching GraphQL, federated GraphQL) so their latency and error behavior can be compared.\n\nConfiguration is flag-based with environment fallbacks (MODE, CONCURRENCY, DURATION, ITERATIONS, TARGET_URL), so the same run shape works from a shell, a compose file, or CI.",
    after_help = "Examples:\n  gwbench run --gateway rest --target-url http://localhost:10000\n  gwbench run --gateway stitching --mode iterations --iterations 1000 --concurrency 10\n  MODE=duration DURATION=30s TARGET_URL=http://localhost:10000 gwbench run --gateway federation\n\nExit codes: 0 = thresholds passed, 1 = thresholds failed, 2 = configuration error."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test against one gateway style
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Gateway style to drive (selects the built-in scenario catalog)
    #[arg(long, env = "GATEWAY", value_enum, default_value_t = GatewayArg::Rest)]
    pub gateway: GatewayArg,

    /// Termination policy
    #[arg(long, env = "MODE", value_enum, default_value_t = ModeArg::Duration)]
    pub mode: ModeArg,

    /// Number of concurrent virtual users
    #[arg(long, env = "CONCURRENCY", default_value_t = 2)]
    pub concurrency: u64,

    /// Run duration (e.g. 10s, 250ms, 1m) — used when --mode duration
    #[arg(long, env = "DURATION", default_value = "10s", value_parser = parse_duration)]
    pub duration: Duration,

    /// Total iterations across all VUs — used when --mode iterations
    #[arg(long, env = "ITERATIONS", default_value_t = 100)]
    pub iterations: u64,

    /// Base URL of the gateway under test (required)
    #[arg(long, env = "TARGET_URL")]
    pub target_url: Option<String>,

    /// Per-scenario weight override (repeatable, NAME=WEIGHT).
    /// Overrides also come from WEIGHT_<NAME> env vars; flags win.
    #[arg(long = "weight", value_name = "NAME=WEIGHT")]
    pub weights: Vec<String>,

    /// Threshold rule (repeatable, METRIC:EXPR, e.g. http_req_duration:p(95)<2000).
    /// Replaces the default rules when given.
    #[arg(long = "threshold", value_name = "METRIC:EXPR")]
    pub thresholds: Vec<String>,

    /// Per-request timeout
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub request_timeout: Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Write final metrics as line-protocol points for a time-series sink
    #[arg(long, env = "EXPORT_PATH", value_name = "PATH")]
    pub export: Option<PathBuf>,
}
