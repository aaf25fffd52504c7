use super::error::{Error, Result};
use super::recorder::MetricsSnapshot;

/// Which aggregate series a rule reads from the snapshot totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum MetricSelector {
    #[strum(serialize = "http_req_duration")]
    HttpReqDuration,

    #[strum(serialize = "http_req_failed")]
    HttpReqFailed,

    #[strum(serialize = "http_reqs")]
    HttpReqs,

    #[strum(serialize = "checks")]
    Checks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl std::fmt::Display for ThresholdOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ThresholdOp::Lt => "<",
            ThresholdOp::Lte => "<=",
            ThresholdOp::Gt => ">",
            ThresholdOp::Gte => ">=",
            ThresholdOp::Eq => "==",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdAgg {
    Avg,
    Max,
    Count,
    Rate,
    /// Percentile in (0, 100].
    P(f64),
}

impl std::fmt::Display for ThresholdAgg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdAgg::Avg => f.write_str("avg"),
            ThresholdAgg::Max => f.write_str("max"),
            ThresholdAgg::Count => f.write_str("count"),
            ThresholdAgg::Rate => f.write_str("rate"),
            ThresholdAgg::P(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub bound: f64,
}

/// One pass/fail assertion, e.g. `http_req_duration:p(95)<2000`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub metric: MetricSelector,
    pub expr: ThresholdExpr,
}

impl std::fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}{}{}",
            self.metric, self.expr.agg, self.expr.op, self.expr.bound
        )
    }
}

#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule: ThresholdRule,
    /// NaN when the metric had zero observations; such rules never pass.
    pub observed: f64,
    pub pass: bool,
}

#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub rules: Vec<RuleOutcome>,
}

impl ThresholdReport {
    pub fn overall_pass(&self) -> bool {
        self.rules.iter().all(|r| r.pass)
    }

    pub fn failed_count(&self) -> usize {
        self.rules.iter().filter(|r| !r.pass).count()
    }
}

/// Parse `METRIC:EXPR`, e.g. `http_req_duration:p(95)<2000` or
/// `http_req_failed:rate<0.05`. Whitespace is insignificant.
pub fn parse_threshold_rule(raw: &str) -> Result<ThresholdRule> {
    let invalid = |msg: &str| Error::InvalidThreshold(raw.to_string(), msg.to_string());

    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (metric_str, expr_str) = s
        .split_once(':')
        .ok_or_else(|| invalid("expected METRIC:EXPR"))?;

    let metric: MetricSelector = metric_str
        .parse()
        .map_err(|_| invalid("unknown metric selector"))?;

    let expr = parse_threshold_expr(expr_str)
        .map_err(|msg| Error::InvalidThreshold(raw.to_string(), msg))?;

    Ok(ThresholdRule { metric, expr })
}

fn parse_threshold_expr(s: &str) -> std::result::Result<ThresholdExpr, String> {
    if s.is_empty() {
        return Err("empty threshold expression".to_string());
    }

    // Two-char operators first so `<=` is not read as `<`.
    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| "missing comparison operator".to_string())?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err("expected AGG OP VALUE".to_string());
    }

    let agg = if left.eq_ignore_ascii_case("avg") {
        ThresholdAgg::Avg
    } else if left.eq_ignore_ascii_case("max") {
        ThresholdAgg::Max
    } else if left.eq_ignore_ascii_case("count") {
        ThresholdAgg::Count
    } else if left.eq_ignore_ascii_case("rate") {
        ThresholdAgg::Rate
    } else if let Some(inner) = left.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
        let p: f64 = inner
            .parse()
            .map_err(|_| format!("invalid percentile `{inner}`"))?;
        if !(p > 0.0 && p <= 100.0) {
            return Err(format!("percentile {p} out of range (0, 100]"));
        }
        ThresholdAgg::P(p)
    } else {
        return Err(format!("unknown aggregation `{left}`"));
    };

    let bound: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric bound `{right}`"))?;

    Ok(ThresholdExpr { agg, op, bound })
}

/// Evaluate every rule against the snapshot totals. A rule over a metric with
/// zero observations reports `observed = NaN` and fails; it cannot pass
/// vacuously. `overall_pass` is the AND over all rules.
pub fn evaluate_thresholds(snapshot: &MetricsSnapshot, rules: &[ThresholdRule]) -> ThresholdReport {
    let rules = rules
        .iter()
        .map(|rule| {
            let observed = observed_value(snapshot, rule).unwrap_or(f64::NAN);
            // Any comparison against NaN is false, which is exactly the
            // required no-data behavior.
            let pass = compare(observed, rule.expr.op, rule.expr.bound);
            RuleOutcome {
                rule: rule.clone(),
                observed,
                pass,
            }
        })
        .collect();

    ThresholdReport { rules }
}

fn observed_value(snapshot: &MetricsSnapshot, rule: &ThresholdRule) -> Option<f64> {
    let totals = &snapshot.totals;
    match (rule.metric, rule.expr.agg) {
        (MetricSelector::HttpReqDuration, ThresholdAgg::Avg) => totals.latency.mean_ms(),
        (MetricSelector::HttpReqDuration, ThresholdAgg::Max) => totals.latency.max_ms(),
        (MetricSelector::HttpReqDuration, ThresholdAgg::Count) => {
            Some(totals.latency.count() as f64)
        }
        (MetricSelector::HttpReqDuration, ThresholdAgg::P(p)) => totals.latency.percentile_ms(p),

        (MetricSelector::HttpReqFailed, ThresholdAgg::Rate) => totals.error_rate(),
        (MetricSelector::HttpReqFailed, ThresholdAgg::Count) => {
            if totals.count == 0 {
                None
            } else {
                Some(totals.error_count() as f64)
            }
        }

        (MetricSelector::HttpReqs, ThresholdAgg::Count) => {
            if totals.count == 0 {
                None
            } else {
                Some(totals.count as f64)
            }
        }

        (MetricSelector::Checks, ThresholdAgg::Rate) => {
            let total = snapshot.checks_total();
            if total == 0 {
                None
            } else {
                let passed = total - snapshot.checks_failed();
                Some(passed as f64 / total as f64)
            }
        }

        // Non-sensical combinations have no observation.
        (_, _) => None,
    }
}

fn compare(left: f64, op: ThresholdOp, right: f64) -> bool {
    match op {
        ThresholdOp::Lt => left < right,
        ThresholdOp::Lte => left <= right,
        ThresholdOp::Gt => left > right,
        ThresholdOp::Gte => left >= right,
        ThresholdOp::Eq => left == right,
    }
}
