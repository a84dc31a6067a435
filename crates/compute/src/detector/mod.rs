//! The anomaly detector: registries plus the run protocol.
//!
//! Split into:
//! - [`core`]: struct, construction, read-only queries, statistics
//! - [`registry`]: pattern / threshold / rule-handler mutation
//! - [`execution`]: `detect_anomalies` and the strategy containment policy

mod core;
mod execution;
mod registry;


use std::fmt;

use serde::Serialize;

pub use self::core::AnomalyDetector;
pub use self::execution::{contain_strategy_outcomes, StrategyResult};
pub use self::registry::RuleLoadSummary;

/// Phases of a single detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Preprocessing,
    Dispatching,
    Merging,
    Reporting,
    ProfileUpdate,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Preprocessing => "preprocessing",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Merging => "merging",
            RunPhase::Reporting => "reporting",
            RunPhase::ProfileUpdate => "profile_update",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Observability counters returned by `get_statistics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectorStatistics {
    /// Completed `detect_anomalies` calls, cache hits included.
    pub total_runs: u64,
    pub cache_hits: u64,
    /// Findings reported across all computed runs.
    pub total_anomalies: u64,
    /// Mean wall-clock time of computed (non-cached) runs.
    pub average_duration_ms: f64,
    pub pattern_count: usize,
    pub enabled_patterns: usize,
    pub threshold_count: usize,
    pub profile_count: usize,
    pub history_len: usize,
    pub cache_entries: usize,
    pub registry_revision: u64,
}
