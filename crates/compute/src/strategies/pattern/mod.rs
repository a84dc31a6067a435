//! Evaluation of the configurable anomaly pattern registry.
//!
//! Patterns dispatch on their detection method: `Z_SCORE` and `IQR` run the
//! statistical tests scoped to the pattern's indicator columns, and
//! `CUSTOM_RULE` looks up a named handler by `pattern_id`. Any other method is
//! rejected. A failing pattern is logged and skipped; the rest still run.

mod handlers;

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tenderscope_core::{AnomalyPattern, AnomalyResult, Dataset, DetectionMethod, Severity};
use tenderscope_rules::defaults::{BUDGET_SPIKE, PRICE_ANOMALY, SUPPLIER_BEHAVIOR, TIMELINE_DEVIATION};
use tracing::{debug, warn};

use super::statistical::{iqr_hits, z_score_hits};
use super::{DetectionKind, DetectionStrategy, StrategyContext};
use crate::error::{DetectError, Result};
use crate::pool::panic_message;

/// A custom rule: evaluates one pattern against the dataset.
pub type RuleHandler = Arc<dyn Fn(&AnomalyPattern, &Dataset) -> Result<Vec<AnomalyResult>> + Send + Sync>;

/// Custom rule handlers keyed by pattern id.
#[derive(Clone, Default)]
pub struct RuleHandlerRegistry {
    handlers: BTreeMap<String, RuleHandler>,
}

impl RuleHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for the four built-in patterns.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BUDGET_SPIKE, handlers::budget_spike);
        registry.register(TIMELINE_DEVIATION, handlers::timeline_deviation);
        registry.register(SUPPLIER_BEHAVIOR, handlers::supplier_behavior);
        registry.register(PRICE_ANOMALY, |p: &AnomalyPattern, d: &Dataset| Ok(scoped_iqr(p, d)));
        registry
    }

    pub fn register<F>(&mut self, pattern_id: impl Into<String>, handler: F)
    where
        F: Fn(&AnomalyPattern, &Dataset) -> Result<Vec<AnomalyResult>> + Send + Sync + 'static,
    {
        self.handlers.insert(pattern_id.into(), Arc::new(handler));
    }

    pub fn get(&self, pattern_id: &str) -> Option<&RuleHandler> {
        self.handlers.get(pattern_id)
    }

    pub fn contains(&self, pattern_id: &str) -> bool {
        self.handlers.contains_key(pattern_id)
    }
}

impl fmt::Debug for RuleHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Check that a pattern can be evaluated at all: its method is supported
/// and, for custom rules, a handler exists for its id.
pub fn ensure_evaluable(pattern: &AnomalyPattern, handlers: &RuleHandlerRegistry) -> Result<()> {
    match pattern.detection_method {
        DetectionMethod::ZScore | DetectionMethod::Iqr => Ok(()),
        DetectionMethod::CustomRule if handlers.contains(&pattern.pattern_id) => Ok(()),
        DetectionMethod::CustomRule => Err(DetectError::UnknownRuleHandler(pattern.pattern_id.clone())),
        method => Err(DetectError::UnsupportedPatternMethod {
            id: pattern.pattern_id.clone(),
            method,
        }),
    }
}

/// Evaluate a single pattern. Findings below the pattern's confidence
/// threshold are dropped.
pub fn evaluate_pattern(
    pattern: &AnomalyPattern,
    dataset: &Dataset,
    handlers: &RuleHandlerRegistry,
) -> Result<Vec<AnomalyResult>> {
    ensure_evaluable(pattern, handlers)?;
    let findings = match pattern.detection_method {
        DetectionMethod::ZScore => scoped_z_score(pattern, dataset),
        DetectionMethod::Iqr => scoped_iqr(pattern, dataset),
        _ => {
            let handler = handlers
                .get(&pattern.pattern_id)
                .ok_or_else(|| DetectError::UnknownRuleHandler(pattern.pattern_id.clone()))?;
            handler(pattern, dataset)?
        }
    };
    Ok(findings
        .into_iter()
        .filter(|f| f.confidence_score >= pattern.confidence_threshold)
        .collect())
}

pub struct PatternStrategy;

impl DetectionStrategy for PatternStrategy {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Pattern
    }

    fn cpu_bound(&self) -> bool {
        true
    }

    fn detect(&self, ctx: &StrategyContext) -> Result<Vec<AnomalyResult>> {
        let mut findings = Vec::new();

        for pattern in ctx.patterns.iter().filter(|p| p.enabled) {
            if !pattern.applies_to(&ctx.dataset) {
                debug!(pattern_id = %pattern.pattern_id, "too few indicator fields present; skipping pattern");
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                evaluate_pattern(pattern, &ctx.dataset, &ctx.handlers)
            }))
            .unwrap_or_else(|payload| Err(DetectError::Panicked(panic_message(payload.as_ref()))));

            match outcome {
                Ok(found) => {
                    debug!(pattern_id = %pattern.pattern_id, findings = found.len(), "pattern evaluated");
                    findings.extend(found);
                }
                Err(e) => {
                    warn!(pattern_id = %pattern.pattern_id, error = %e, "pattern evaluation failed; skipping");
                }
            }
        }

        Ok(findings)
    }
}

/// Label a finding with the pattern it came from.
pub(crate) fn tag(finding: AnomalyResult, pattern: &AnomalyPattern) -> AnomalyResult {
    finding
        .with_context("pattern_id", pattern.pattern_id.as_str())
        .with_metadata("pattern_name", pattern.pattern_name.as_str())
}

/// Z-score test over the pattern's numeric indicator columns.
fn scoped_z_score(pattern: &AnomalyPattern, dataset: &Dataset) -> Vec<AnomalyResult> {
    let threshold = pattern.param("z_threshold", 3.0);
    let severity = pattern.severity_for("outlier", Severity::Medium);

    pattern
        .present_indicators(dataset)
        .into_iter()
        .filter_map(|column| dataset.numeric(column).map(|values| (column, values)))
        .flat_map(|(column, values)| {
            z_score_hits(values, threshold).into_iter().map(move |hit| {
                tag(
                    AnomalyResult::new(pattern.pattern_type, DetectionMethod::ZScore, severity)
                        .with_scores((hit.z / 5.0).min(1.0), hit.z)
                        .with_text(
                            pattern.pattern_name.as_str(),
                            format!(
                                "{} ({} = {}, {:.2} standard deviations from the mean)",
                                pattern.description, column, hit.value, hit.z
                            ),
                        )
                        .with_field(column)
                        .with_original(hit.value)
                        .with_expected(hit.mean)
                        .with_deviation(hit.value - hit.mean)
                        .with_threshold(threshold)
                        .with_context("row_index", hit.row),
                    pattern,
                )
            })
        })
        .collect()
}

/// IQR test over the pattern's numeric indicator columns.
pub(crate) fn scoped_iqr(pattern: &AnomalyPattern, dataset: &Dataset) -> Vec<AnomalyResult> {
    let k = pattern.param("iqr_multiplier", 1.5);
    let severity = pattern.severity_for("outlier", Severity::Medium);

    pattern
        .present_indicators(dataset)
        .into_iter()
        .filter_map(|column| dataset.numeric(column).map(|values| (column, values)))
        .flat_map(|(column, values)| {
            iqr_hits(values, k).into_iter().map(move |hit| {
                tag(
                    AnomalyResult::new(pattern.pattern_type, DetectionMethod::Iqr, severity)
                        .with_scores(0.8, hit.score())
                        .with_text(
                            pattern.pattern_name.as_str(),
                            format!(
                                "{} ({} = {} outside [{:.2}, {:.2}])",
                                pattern.description, column, hit.value, hit.lower, hit.upper
                            ),
                        )
                        .with_field(column)
                        .with_original(hit.value)
                        .with_expected(hit.median)
                        .with_deviation(hit.value - hit.median)
                        .with_threshold(hit.violated_bound())
                        .with_context("row_index", hit.row),
                    pattern,
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests;
