use std::time::Duration;

use tenderscope_core::{CoreError, DetectionMethod};

/// Errors raised by the detection engine.
///
/// Only `Input` (and lock poisoning on registry writes) ever reaches the
/// caller of a detection run; every other variant is contained per strategy
/// or per rule and surfaces in the report's strategy outcomes.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error(transparent)]
    Input(#[from] CoreError),
    #[error("Strategy failed: {0}")]
    StrategyFailed(String),
    #[error("Strategy panicked: {0}")]
    Panicked(String),
    #[error("Strategy timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Worker dropped the result channel")]
    WorkerLost,
    #[error("Worker pool error: {0}")]
    Pool(String),
    #[error("No custom rule handler registered for pattern '{0}'")]
    UnknownRuleHandler(String),
    #[error("Pattern '{id}' uses detection method {method}, which pattern evaluation does not support")]
    UnsupportedPatternMethod { id: String, method: DetectionMethod },
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, DetectError>;
