pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors are fatal and detected before any request is issued.
/// Per-request transport/validation failures never surface here; they resolve
/// into recorded outcomes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("scenario catalog is empty")]
    EmptyCatalog,

    #[error("duplicate scenario name: `{0}`")]
    DuplicateScenario(String),

    #[error("scenario `{scenario}` has invalid weight {weight} (must be >= 0)")]
    NegativeWeight { scenario: String, weight: f64 },

    #[error("catalog weights sum to zero or less; at least one positive weight is required")]
    NonPositiveTotalWeight,

    #[error("weight override names unknown scenario: `{0}`")]
    UnknownScenario(String),

    #[error("`concurrency` must be a positive integer")]
    InvalidConcurrency,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("target URL is required (set TARGET_URL or pass --target-url)")]
    MissingTargetUrl,

    #[error("invalid target URL `{0}` (expected an absolute http:// URL)")]
    InvalidTargetUrl(String),

    #[error("invalid threshold `{0}`: {1}")]
    InvalidThreshold(String, String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
