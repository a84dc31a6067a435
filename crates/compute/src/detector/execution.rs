//! The detection run: preprocess, dispatch, contain, merge, report.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tenderscope_core::{AnomalyResult, Dataset, DetectionInput};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::core::{poisoned, AnomalyDetector};
use super::RunPhase;
use crate::cache::fingerprint;
use crate::error::{DetectError, Result};
use crate::merge::finalize;
use crate::pool::{panic_message, WorkerPool};
use crate::report::{build_report, AnomalyReport, ReportContext, StrategyOutcome};
use crate::strategies::{DetectionKind, DetectionStrategy, StrategyContext};

/// What one strategy task produced: its kind, its result and how long it took.
pub type StrategyResult = (DetectionKind, Result<Vec<AnomalyResult>>, Duration);

/// Split strategy results into the findings of the successful ones and a
/// per-strategy outcome list. Failures are logged and recorded, never
/// propagated. Findings keep the order of `results`.
pub fn contain_strategy_outcomes(results: Vec<StrategyResult>) -> (Vec<AnomalyResult>, Vec<StrategyOutcome>) {
    let mut findings = Vec::new();
    let mut outcomes = Vec::with_capacity(results.len());

    for (kind, result, elapsed) in results {
        let elapsed_ms = elapsed.as_millis() as u64;
        match result {
            Ok(found) => {
                debug!(strategy = %kind, findings = found.len(), elapsed_ms, "strategy completed");
                outcomes.push(StrategyOutcome {
                    strategy: kind,
                    findings: found.len(),
                    error: None,
                    elapsed_ms,
                });
                findings.extend(found);
            }
            Err(e) => {
                warn!(strategy = %kind, error = %e, elapsed_ms, "strategy failed; continuing without it");
                outcomes.push(StrategyOutcome {
                    strategy: kind,
                    findings: 0,
                    error: Some(e.to_string()),
                    elapsed_ms,
                });
            }
        }
    }

    (findings, outcomes)
}

/// Requested kinds, deduplicated and in canonical order. `None` or an empty
/// list selects every strategy.
fn resolve_kinds(requested: Option<&[DetectionKind]>) -> Vec<DetectionKind> {
    match requested {
        Some(kinds) if !kinds.is_empty() => {
            let wanted: BTreeSet<DetectionKind> = kinds.iter().copied().collect();
            DetectionKind::ALL.into_iter().filter(|k| wanted.contains(k)).collect()
        }
        _ => DetectionKind::ALL.to_vec(),
    }
}

async fn run_strategy(
    strategy: Arc<dyn DetectionStrategy>,
    ctx: StrategyContext,
    pool: Arc<WorkerPool>,
    deadline: Duration,
) -> Result<Vec<AnomalyResult>> {
    let work = async move {
        if strategy.cpu_bound() {
            pool.run(move || strategy.detect(&ctx)).await
        } else {
            strategy.detect(&ctx)
        }
    };
    match timeout(deadline, work).await {
        Ok(result) => result,
        Err(_) => Err(DetectError::TimedOut(deadline)),
    }
}

impl AnomalyDetector {
    /// Parse `value` as a record or a table of records and run
    /// [`detect_anomalies`](Self::detect_anomalies) on it.
    pub async fn detect_json(
        &self,
        value: serde_json::Value,
        project_id: &str,
        detection_types: Option<&[DetectionKind]>,
    ) -> Result<AnomalyReport> {
        let input = DetectionInput::from_json(value).map_err(|e| {
            error!(project_id, phase = %RunPhase::Failed, error = %e, "rejected detection input");
            DetectError::from(e)
        })?;
        self.detect_anomalies(input, project_id, detection_types).await
    }

    /// Run the requested strategies over `input` and return the report.
    ///
    /// Only invalid input (or a poisoned registry) fails the call. Strategy
    /// failures, panics and timeouts are contained and recorded in the
    /// report's `strategy_outcomes`.
    pub async fn detect_anomalies(
        &self,
        input: DetectionInput,
        project_id: &str,
        detection_types: Option<&[DetectionKind]>,
    ) -> Result<AnomalyReport> {
        let _gate = self.run_gate.lock().await;
        let started = Instant::now();
        let kinds = resolve_kinds(detection_types);

        let cache_key = if self.config.cache_enabled {
            let revision = self.revision.load(Ordering::Relaxed);
            match fingerprint(project_id, &input, &self.config, &kinds, revision) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "could not fingerprint input; bypassing cache");
                    None
                }
            }
        } else {
            None
        };

        if let Some(key) = &cache_key {
            let hit = self.cache.lock().map_err(poisoned("result cache"))?.get(key);
            if let Some(mut report) = hit {
                report.from_cache = true;
                self.counters.total_runs.fetch_add(1, Ordering::Relaxed);
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                info!(project_id, report_id = %report.report_id, "served report from cache");
                return Ok(report);
            }
        }

        debug!(project_id, phase = %RunPhase::Preprocessing, "run phase");
        let dataset = match Dataset::preprocess(input) {
            Ok(dataset) => Arc::new(dataset),
            Err(e) => {
                error!(project_id, phase = %RunPhase::Failed, error = %e, "rejected detection input");
                return Err(e.into());
            }
        };

        let patterns = self.patterns()?;
        let ctx = StrategyContext {
            dataset: Arc::clone(&dataset),
            config: Arc::clone(&self.config),
            patterns: Arc::new(patterns.clone()),
            thresholds: Arc::new(self.thresholds()?),
            handlers: Arc::new(self.handlers.read().map_err(poisoned("rule handlers"))?.clone()),
        };

        debug!(project_id, phase = %RunPhase::Dispatching, strategies = kinds.len(), "run phase");
        let deadline = Duration::from_secs(self.config.timeout_seconds);
        let mut tasks = Vec::with_capacity(kinds.len());
        for &kind in &kinds {
            let Some(strategy) = self.strategies.get(kind) else {
                warn!(strategy = %kind, "no strategy registered for requested kind");
                continue;
            };
            let ctx = ctx.clone();
            let pool = Arc::clone(&self.pool);
            let handle = tokio::spawn(async move {
                let t = Instant::now();
                let result = run_strategy(strategy, ctx, pool, deadline).await;
                (result, t.elapsed())
            });
            tasks.push((kind, handle));
        }

        let (task_kinds, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let joined = join_all(handles).await;
        let results: Vec<StrategyResult> = task_kinds
            .into_iter()
            .zip(joined)
            .map(|(kind, joined)| match joined {
                Ok((result, elapsed)) => (kind, result, elapsed),
                Err(e) => {
                    let reason = if e.is_panic() {
                        panic_message(e.into_panic().as_ref())
                    } else {
                        e.to_string()
                    };
                    (kind, Err(DetectError::Panicked(reason)), Duration::ZERO)
                }
            })
            .collect();

        debug!(project_id, phase = %RunPhase::Merging, "run phase");
        let (findings, outcomes) = contain_strategy_outcomes(results);
        let raw = findings.len();
        let anomalies = finalize(findings, self.config.severity_order, self.config.max_anomalies_per_check);

        debug!(project_id, phase = %RunPhase::Reporting, "run phase");
        let elapsed = started.elapsed();
        let report = build_report(
            anomalies,
            outcomes,
            ReportContext {
                project_id,
                detection_types: &kinds,
                patterns: &patterns,
                config: &self.config,
                rows: dataset.row_count(),
                fields: dataset.column_count(),
                elapsed,
            },
        );

        self.history
            .write()
            .map_err(poisoned("run history"))?
            .push(report.clone());

        debug!(project_id, phase = %RunPhase::ProfileUpdate, "run phase");
        match self.profiles.write() {
            Ok(mut profiles) => {
                let update = profiles.update(&dataset, &report.anomalies, self.config.profile_smoothing);
                debug!(created = update.created, updated = update.updated, "profiles updated");
            }
            Err(e) => warn!(error = %e, "profile registry poisoned; skipping profile update"),
        }

        if let Some(key) = cache_key {
            match self.cache.lock() {
                Ok(mut cache) => cache.insert(key, report.clone()),
                Err(e) => warn!(error = %e, "result cache poisoned; report not cached"),
            }
        }

        self.counters.total_runs.fetch_add(1, Ordering::Relaxed);
        self.counters
            .total_anomalies
            .fetch_add(report.anomalies.len() as u64, Ordering::Relaxed);
        self.counters
            .total_duration_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);

        let failed = report.strategy_outcomes.iter().filter(|o| !o.succeeded()).count();
        info!(
            project_id,
            report_id = %report.report_id,
            phase = %RunPhase::Done,
            raw_findings = raw,
            anomalies = report.anomalies.len(),
            failed_strategies = failed,
            risk = %report.overall_risk_level,
            elapsed_ms = elapsed.as_millis() as u64,
            "detection run complete"
        );
        Ok(report)
    }
}
