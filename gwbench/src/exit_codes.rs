#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed and all thresholds passed.
    Success = 0,

    /// Run completed but at least one threshold failed.
    ThresholdsFailed = 1,

    /// Configuration error detected before any request was issued
    /// (bad flags, missing target URL, unknown mode, bad catalog).
    InvalidConfig = 2,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
