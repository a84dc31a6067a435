//! Detection strategies.
//!
//! Each strategy consumes the preprocessed [`Dataset`] plus a per-run
//! snapshot of config and registries, and produces zero or more findings.
//! Strategies are looked up by [`DetectionKind`] in a [`StrategyRegistry`],
//! so adding one is a registration rather than a new branch in the detector.

pub mod behavioral;
pub mod outlier;
pub mod pattern;
pub mod statistical;
pub mod temporal;
pub mod threshold;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tenderscope_core::{AnomalyPattern, AnomalyResult, Dataset, DetectionConfig, ThresholdRule};

use crate::error::Result;

pub use behavioral::BehavioralStrategy;
pub use outlier::OutlierStrategy;
pub use pattern::{PatternStrategy, RuleHandler, RuleHandlerRegistry};
pub use statistical::StatisticalStrategy;
pub use temporal::TemporalStrategy;
pub use threshold::ThresholdStrategy;

/// The six detection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Statistical,
    Behavioral,
    Temporal,
    Pattern,
    Outlier,
    Threshold,
}

impl DetectionKind {
    /// All strategies, in the order their findings are concatenated.
    pub const ALL: [DetectionKind; 6] = [
        DetectionKind::Statistical,
        DetectionKind::Behavioral,
        DetectionKind::Temporal,
        DetectionKind::Pattern,
        DetectionKind::Outlier,
        DetectionKind::Threshold,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DetectionKind::Statistical => "statistical",
            DetectionKind::Behavioral => "behavioral",
            DetectionKind::Temporal => "temporal",
            DetectionKind::Pattern => "pattern",
            DetectionKind::Outlier => "outlier",
            DetectionKind::Threshold => "threshold",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DetectionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "statistical" => Ok(DetectionKind::Statistical),
            "behavioral" | "behavioural" => Ok(DetectionKind::Behavioral),
            "temporal" => Ok(DetectionKind::Temporal),
            "pattern" => Ok(DetectionKind::Pattern),
            "outlier" | "ml" | "machine_learning" => Ok(DetectionKind::Outlier),
            "threshold" => Ok(DetectionKind::Threshold),
            other => Err(format!("unknown detection type: '{}'", other)),
        }
    }
}

/// Everything a strategy may read during one run. Cheap to clone; the
/// registries are snapshots taken when the run starts.
#[derive(Clone)]
pub struct StrategyContext {
    pub dataset: Arc<Dataset>,
    pub config: Arc<DetectionConfig>,
    pub patterns: Arc<Vec<AnomalyPattern>>,
    pub thresholds: Arc<Vec<ThresholdRule>>,
    pub handlers: Arc<RuleHandlerRegistry>,
}

impl StrategyContext {
    /// Context with default config, no patterns, no thresholds and the
    /// built-in rule handlers.
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
            config: Arc::new(DetectionConfig::default()),
            patterns: Arc::new(Vec::new()),
            thresholds: Arc::new(Vec::new()),
            handlers: Arc::new(RuleHandlerRegistry::with_defaults()),
        }
    }

    pub fn with_config(mut self, config: DetectionConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<AnomalyPattern>) -> Self {
        self.patterns = Arc::new(patterns);
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<ThresholdRule>) -> Self {
        self.thresholds = Arc::new(thresholds);
        self
    }
}

/// A detection strategy.
///
/// Implementations are pure with respect to the context: they never mutate
/// detector state, so any number of them may run concurrently.
pub trait DetectionStrategy: Send + Sync {
    fn kind(&self) -> DetectionKind;

    /// Whether the strategy should run on the CPU worker pool instead of the
    /// async executor.
    fn cpu_bound(&self) -> bool {
        false
    }

    fn detect(&self, ctx: &StrategyContext) -> Result<Vec<AnomalyResult>>;
}

/// Strategies keyed by kind.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<DetectionKind, Arc<dyn DetectionStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the six built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StatisticalStrategy));
        registry.register(Arc::new(BehavioralStrategy));
        registry.register(Arc::new(TemporalStrategy));
        registry.register(Arc::new(PatternStrategy));
        registry.register(Arc::new(OutlierStrategy));
        registry.register(Arc::new(ThresholdStrategy));
        registry
    }

    /// Register a strategy, replacing any previous one of the same kind.
    pub fn register(&mut self, strategy: Arc<dyn DetectionStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: DetectionKind) -> Option<Arc<dyn DetectionStrategy>> {
        self.strategies.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
