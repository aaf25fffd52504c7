use anyhow::Context as _;

use gwbench_core::runner::{
    RunConfig, RunController, RunHooks, RunMode, ScenarioCatalog, ThresholdRule,
    evaluate_thresholds, parse_threshold_rule,
};

use crate::catalogs;
use crate::cli::{ModeArg, RunArgs};
use crate::exit_codes::ExitCode;
use crate::export;
use crate::output::{self, RunHeader};

/// Default pass/fail gates, matching the comparison methodology the three
/// gateways are benchmarked under.
const DEFAULT_THRESHOLDS: &[&str] = &["http_req_duration:p(95)<2000", "http_req_failed:rate<0.05"];

/// Every error returned here is a configuration error detected before any
/// request is issued; main maps it to exit code 2.
pub async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let out = output::formatter(args.output);

    let target_url = args
        .target_url
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or(gwbench_core::runner::Error::MissingTargetUrl)?;

    let mode = match args.mode {
        ModeArg::Duration => RunMode::Duration(args.duration),
        ModeArg::Iterations => RunMode::Iterations(args.iterations),
    };

    let thresholds = parse_thresholds(&args.thresholds)?;
    let weight_overrides = collect_weight_overrides(&args.weights, std::env::vars())?;

    let config = RunConfig {
        mode,
        concurrency: args.concurrency,
        request_timeout: args.request_timeout,
        target_url: target_url.clone(),
        thresholds: thresholds.clone(),
        weight_overrides: weight_overrides.clone(),
    };

    let catalog = ScenarioCatalog::with_weight_overrides(
        catalogs::scenarios(args.gateway, &target_url),
        &weight_overrides,
    )?;

    let controller = RunController::new(config, catalog)?;

    let mode_str = match args.mode {
        ModeArg::Duration => "duration",
        ModeArg::Iterations => "iterations",
    };
    out.print_header(&RunHeader {
        gateway: args.gateway.as_str(),
        target_url,
        mode: mode_str.to_string(),
        concurrency: args.concurrency,
    });

    let report = controller
        .run(RunHooks::default(), out.progress())
        .await
        .context("load run failed")?;

    let threshold_report = evaluate_thresholds(&report.snapshot, &thresholds);

    out.print_summary(&report, &threshold_report)?;

    if let Some(path) = &args.export {
        let testid = format!("case-{}-{mode_str}", args.gateway.as_str());
        // Export failure loses the sink copy, not the verdict; don't fail the
        // run over it.
        if let Err(err) = export::write(path, &report.snapshot, &testid).await {
            tracing::warn!(error = %err, path = %path.display(), "metrics export failed");
        }
    }

    if threshold_report.overall_pass() {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::ThresholdsFailed)
    }
}

fn parse_thresholds(raw: &[String]) -> anyhow::Result<Vec<ThresholdRule>> {
    let rules: Vec<&str> = if raw.is_empty() {
        DEFAULT_THRESHOLDS.to_vec()
    } else {
        raw.iter().map(String::as_str).collect()
    };

    rules
        .into_iter()
        .map(|r| parse_threshold_rule(r).map_err(anyhow::Error::from))
        .collect()
}

/// Merge weight overrides: `WEIGHT_<NAME>` environment variables first, then
/// repeatable `--weight NAME=W` flags (flags win). Scenario names are matched
/// lowercase.
fn collect_weight_overrides(
    flags: &[String],
    env: impl Iterator<Item = (String, String)>,
) -> anyhow::Result<Vec<(String, f64)>> {
    let mut overrides: Vec<(String, f64)> = Vec::new();

    let mut push = |name: String, weight: f64| {
        if let Some(existing) = overrides.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = weight;
        } else {
            overrides.push((name, weight));
        }
    };

    for (key, value) in env {
        let Some(name) = key.strip_prefix("WEIGHT_") else {
            continue;
        };
        let weight: f64 = value
            .parse()
            .with_context(|| format!("invalid weight in {key}={value}"))?;
        push(name.to_ascii_lowercase(), weight);
    }

    for raw in flags {
        let (name, value) = raw
            .split_once('=')
            .with_context(|| format!("invalid --weight (expected NAME=WEIGHT): {raw}"))?;
        if name.is_empty() {
            anyhow::bail!("invalid --weight (empty NAME): {raw}");
        }
        let weight: f64 = value
            .parse()
            .with_context(|| format!("invalid weight in --weight {raw}"))?;
        push(name.to_ascii_lowercase(), weight);
    }

    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_parse() {
        let rules = parse_thresholds(&[]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].to_string(), "http_req_duration:p(95)<2000");
        assert_eq!(rules[1].to_string(), "http_req_failed:rate<0.05");
    }

    #[test]
    fn explicit_thresholds_replace_defaults() {
        let rules = parse_thresholds(&["http_req_duration:p(99)<100".to_string()])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn bad_threshold_is_a_config_error() {
        assert!(parse_thresholds(&["bogus".to_string()]).is_err());
    }

    #[test]
    fn weight_flags_win_over_env() {
        let env = vec![
            ("WEIGHT_FLEET_DASHBOARD".to_string(), "0.9".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];
        let flags = vec!["fleet_dashboard=0.1".to_string()];

        let overrides =
            collect_weight_overrides(&flags, env.into_iter()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(overrides, vec![("fleet_dashboard".to_string(), 0.1)]);
    }

    #[test]
    fn env_weights_apply_without_flags() {
        let env = vec![("WEIGHT_ROBOT_MONITOR".to_string(), "0.8".to_string())];
        let overrides =
            collect_weight_overrides(&[], env.into_iter()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(overrides, vec![("robot_monitor".to_string(), 0.8)]);
    }

    #[test]
    fn malformed_weight_is_a_config_error() {
        assert!(collect_weight_overrides(&["a=x".to_string()], std::iter::empty()).is_err());
        assert!(collect_weight_overrides(&["justaname".to_string()], std::iter::empty()).is_err());
        let env = vec![("WEIGHT_A".to_string(), "nope".to_string())];
        assert!(collect_weight_overrides(&[], env.into_iter()).is_err());
    }
}
