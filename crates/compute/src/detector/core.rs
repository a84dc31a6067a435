//! Core [`AnomalyDetector`] struct: construction and read-only queries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tenderscope_core::{AnomalyPattern, BehaviorProfile, DetectionConfig, ThresholdRule};
use tenderscope_rules::{default_patterns, default_thresholds};
use tracing::info;

use super::DetectorStatistics;
use crate::cache::ResultCache;
use crate::error::{DetectError, Result};
use crate::history::RunHistory;
use crate::pool::WorkerPool;
use crate::profiles::ProfileRegistry;
use crate::report::AnomalyReport;
use crate::strategies::{RuleHandlerRegistry, StrategyRegistry};

/// Run counters, updated once per completed run.
#[derive(Debug, Default)]
pub(super) struct RunCounters {
    pub total_runs: AtomicU64,
    pub cache_hits: AtomicU64,
    pub total_anomalies: AtomicU64,
    pub total_duration_ms: AtomicU64,
}

/// Multi-method anomaly detector for procurement records.
///
/// Owns the pattern, threshold and profile registries, the run history and
/// the result cache. Registries sit behind `RwLock`s; runs on one instance
/// are serialized by an async gate so history and profiles see one writer
/// at a time.
pub struct AnomalyDetector {
    pub(super) config: Arc<DetectionConfig>,
    pub(super) strategies: StrategyRegistry,
    pub(super) pool: Arc<WorkerPool>,
    pub(super) patterns: RwLock<BTreeMap<String, AnomalyPattern>>,
    pub(super) thresholds: RwLock<Vec<ThresholdRule>>,
    pub(super) handlers: RwLock<RuleHandlerRegistry>,
    pub(super) profiles: RwLock<ProfileRegistry>,
    pub(super) history: RwLock<RunHistory>,
    pub(super) cache: Mutex<ResultCache>,
    pub(super) counters: RunCounters,
    /// Bumped on every registry mutation; part of the cache key.
    pub(super) revision: AtomicU64,
    pub(super) run_gate: tokio::sync::Mutex<()>,
}

impl AnomalyDetector {
    /// Detector with the six built-in strategies, default patterns, default
    /// thresholds and built-in rule handlers.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        Self::with_strategies(config, StrategyRegistry::with_defaults())
    }

    /// Detector with a custom strategy registry.
    pub fn with_strategies(config: DetectionConfig, strategies: StrategyRegistry) -> Result<Self> {
        config.validate()?;

        let patterns = default_patterns()
            .into_iter()
            .map(|p| (p.pattern_id.clone(), p))
            .collect();

        let detector = Self {
            pool: Arc::new(WorkerPool::new(config.max_workers)?),
            strategies,
            patterns: RwLock::new(patterns),
            thresholds: RwLock::new(default_thresholds()),
            handlers: RwLock::new(RuleHandlerRegistry::with_defaults()),
            profiles: RwLock::new(ProfileRegistry::new()),
            history: RwLock::new(RunHistory::new(config.max_history)),
            cache: Mutex::new(ResultCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_minutes * 60),
            )),
            counters: RunCounters::default(),
            revision: AtomicU64::new(0),
            run_gate: tokio::sync::Mutex::new(()),
            config: Arc::new(config),
        };

        info!(
            strategies = detector.strategies.len(),
            workers = detector.pool.workers(),
            "anomaly detector initialized"
        );
        Ok(detector)
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Snapshot of registered patterns, ordered by id.
    pub fn patterns(&self) -> Result<Vec<AnomalyPattern>> {
        let patterns = self.patterns.read().map_err(poisoned("pattern registry"))?;
        Ok(patterns.values().cloned().collect())
    }

    pub fn thresholds(&self) -> Result<Vec<ThresholdRule>> {
        let thresholds = self.thresholds.read().map_err(poisoned("threshold registry"))?;
        Ok(thresholds.clone())
    }

    pub fn get_profile(&self, entity_id: &str) -> Result<Option<BehaviorProfile>> {
        let profiles = self.profiles.read().map_err(poisoned("profile registry"))?;
        Ok(profiles.get(entity_id).cloned())
    }

    pub fn profiles(&self) -> Result<Vec<BehaviorProfile>> {
        let profiles = self.profiles.read().map_err(poisoned("profile registry"))?;
        Ok(profiles.iter().cloned().collect())
    }

    /// Up to `n` past reports, newest first.
    pub fn recent_reports(&self, n: usize) -> Result<Vec<AnomalyReport>> {
        let history = self.history.read().map_err(poisoned("run history"))?;
        Ok(history.recent(n))
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache.lock().map_err(poisoned("result cache"))?.clear();
        Ok(())
    }

    /// Run counters and registry sizes. No side effects.
    pub fn get_statistics(&self) -> Result<DetectorStatistics> {
        let total_runs = self.counters.total_runs.load(Ordering::Relaxed);
        let cache_hits = self.counters.cache_hits.load(Ordering::Relaxed);
        let computed = total_runs.saturating_sub(cache_hits);
        let average_duration_ms = if computed == 0 {
            0.0
        } else {
            self.counters.total_duration_ms.load(Ordering::Relaxed) as f64 / computed as f64
        };

        let (pattern_count, enabled_patterns) = {
            let patterns = self.patterns.read().map_err(poisoned("pattern registry"))?;
            (patterns.len(), patterns.values().filter(|p| p.enabled).count())
        };

        Ok(DetectorStatistics {
            total_runs,
            cache_hits,
            total_anomalies: self.counters.total_anomalies.load(Ordering::Relaxed),
            average_duration_ms,
            pattern_count,
            enabled_patterns,
            threshold_count: self.thresholds.read().map_err(poisoned("threshold registry"))?.len(),
            profile_count: self.profiles.read().map_err(poisoned("profile registry"))?.len(),
            history_len: self.history.read().map_err(poisoned("run history"))?.len(),
            cache_entries: self.cache.lock().map_err(poisoned("result cache"))?.len(),
            registry_revision: self.revision.load(Ordering::Relaxed),
        })
    }

    pub(super) fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::Relaxed);
    }
}

/// Map a poisoned lock into [`DetectError::LockPoisoned`].
pub(super) fn poisoned<T>(what: &'static str) -> impl FnOnce(PoisonError<T>) -> DetectError {
    move |e| DetectError::LockPoisoned(format!("{}: {}", what, e))
}
