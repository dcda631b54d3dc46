use fraudgate_models::{AnalyzerName, ConfigError, FailureReason, ValidationError};
use thiserror::Error;

/// Failure of a single analyzer. Never escapes the dispatcher.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Analyzer response parse error: {0}")]
    Parse(String),

    #[error("Analyzer response rejected: {0}")]
    Invalid(String),

    #[error("Analyzer timed out after {0} ms")]
    Timeout(u64),

    /// The analyzer's backend cannot run at all, e.g. the CLI is not installed.
    #[error("Analyzer backend unavailable: {0}")]
    Unavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyzerError {
    /// How this error is recorded in the result store.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            AnalyzerError::Timeout(_) => FailureReason::Timeout,
            AnalyzerError::Unavailable(_) => FailureReason::Skipped,
            _ => FailureReason::ExecutionError,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AnalyzerError::Unavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("result for {0} already recorded")]
    Duplicate(AnalyzerName),

    #[error("result store sealed, late result for {0} dropped")]
    Sealed(AnalyzerName),

    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

/// Request-level failures. Everything else folds into the decision.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Invalid transaction: {0}")]
    Validation(#[from] ValidationError),

    #[error("Analyzer {0} reported more than once")]
    DuplicateResult(AnalyzerName),

    #[error("Result store error: {0}")]
    Store(StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<StoreError> for EvaluationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(name) => EvaluationError::DuplicateResult(name),
            other => EvaluationError::Store(other),
        }
    }
}
