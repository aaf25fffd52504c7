use gwbench_core::runner::{ProgressFn, RunReport, ThresholdReport};

use crate::cli::OutputFormat;

mod human;
mod json;

/// Context printed before the run starts.
#[derive(Debug, Clone)]
pub(crate) struct RunHeader {
    pub gateway: &'static str,
    pub target_url: String,
    pub mode: String,
    pub concurrency: u64,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, header: &RunHeader);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(
        &self,
        report: &RunReport,
        thresholds: &ThresholdReport,
    ) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
