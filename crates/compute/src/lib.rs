pub mod algorithms;
pub mod cache;
pub mod detector;
pub mod error;
pub mod history;
pub mod merge;
pub mod pool;
pub mod profiles;
pub mod report;
pub mod strategies;

pub use detector::{
    contain_strategy_outcomes, AnomalyDetector, DetectorStatistics, RuleLoadSummary, RunPhase, StrategyResult,
};
pub use error::{DetectError, Result};
pub use report::{AnomalyMetrics, AnomalyReport, RiskLevel, StrategyOutcome};
pub use strategies::{DetectionKind, DetectionStrategy, StrategyContext, StrategyRegistry};
