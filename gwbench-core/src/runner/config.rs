use std::time::Duration;

use super::error::{Error, Result};
use super::thresholds::ThresholdRule;

/// Run-termination policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Stop claiming iterations once a wall-clock deadline elapses.
    Duration(Duration),
    /// Execute exactly this many iterations in aggregate across all VUs.
    Iterations(u64),
}

/// Immutable run configuration, parsed and validated once before launch.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    pub concurrency: u64,
    pub request_timeout: Duration,
    pub target_url: String,
    pub thresholds: Vec<ThresholdRule>,
    pub weight_overrides: Vec<(String, f64)>,
}

impl RunConfig {
    /// Semantic validation; every failure here is a pre-run configuration
    /// error (process exit code 2).
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }

        match self.mode {
            RunMode::Duration(d) if d.is_zero() => return Err(Error::InvalidDuration),
            RunMode::Iterations(0) => return Err(Error::InvalidIterations),
            _ => {}
        }

        if self.target_url.is_empty() {
            return Err(Error::MissingTargetUrl);
        }
        let parsed = url::Url::parse(&self.target_url)
            .map_err(|_| Error::InvalidTargetUrl(self.target_url.clone()))?;
        if parsed.scheme() != "http" {
            return Err(Error::InvalidTargetUrl(self.target_url.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            mode: RunMode::Iterations(100),
            concurrency: 2,
            request_timeout: Duration::from_secs(30),
            target_url: "http://localhost:10000".to_string(),
            thresholds: Vec::new(),
            weight_overrides: Vec::new(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut cfg = config();
        cfg.concurrency = 0;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConcurrency)));
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let mut cfg = config();
        cfg.mode = RunMode::Iterations(0);
        assert!(matches!(cfg.validate(), Err(Error::InvalidIterations)));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut cfg = config();
        cfg.mode = RunMode::Duration(Duration::ZERO);
        assert!(matches!(cfg.validate(), Err(Error::InvalidDuration)));
    }

    #[test]
    fn missing_target_url_is_rejected() {
        let mut cfg = config();
        cfg.target_url = String::new();
        assert!(matches!(cfg.validate(), Err(Error::MissingTargetUrl)));
    }

    #[test]
    fn non_http_target_url_is_rejected() {
        let mut cfg = config();
        cfg.target_url = "ftp://example.com".to_string();
        assert!(matches!(cfg.validate(), Err(Error::InvalidTargetUrl(_))));
    }
}
