//! Pattern, threshold and rule-handler registry mutation.
//!
//! Every mutation bumps the registry revision so cached reports computed
//! against the old rules are never served.

use tenderscope_core::{AnomalyPattern, AnomalyResult, Dataset, ThresholdRule};
use tenderscope_rules::RuleLoader;
use tracing::{info, warn};

use super::core::{poisoned, AnomalyDetector};
use crate::error::{DetectError, Result};
use crate::strategies::pattern::ensure_evaluable;

/// Outcome of registering the rules from a [`RuleLoader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleLoadSummary {
    pub patterns: usize,
    pub thresholds: usize,
    pub rejected: usize,
}

impl AnomalyDetector {
    /// Register a pattern, replacing any pattern with the same id.
    ///
    /// Rejects invalid patterns, custom rules without a registered handler
    /// and detection methods pattern evaluation does not support.
    pub fn add_pattern(&self, pattern: AnomalyPattern) -> Result<()> {
        pattern
            .validate()
            .map_err(|e| DetectError::InvalidPattern(e.to_string()))?;
        {
            let handlers = self.handlers.read().map_err(poisoned("rule handlers"))?;
            ensure_evaluable(&pattern, &handlers)?;
        }

        let mut patterns = self.patterns.write().map_err(poisoned("pattern registry"))?;
        let id = pattern.pattern_id.clone();
        let replaced = patterns.insert(id.clone(), pattern).is_some();
        drop(patterns);
        self.bump_revision();
        info!(pattern_id = %id, replaced, "pattern registered");
        Ok(())
    }

    /// Remove a pattern by id, returning it if it existed.
    pub fn remove_pattern(&self, pattern_id: &str) -> Result<Option<AnomalyPattern>> {
        let removed = self
            .patterns
            .write()
            .map_err(poisoned("pattern registry"))?
            .remove(pattern_id);
        if removed.is_some() {
            self.bump_revision();
            info!(pattern_id, "pattern removed");
        }
        Ok(removed)
    }

    /// Enable or disable a pattern. Returns false if no such pattern exists.
    pub fn set_pattern_enabled(&self, pattern_id: &str, enabled: bool) -> Result<bool> {
        let mut patterns = self.patterns.write().map_err(poisoned("pattern registry"))?;
        let Some(pattern) = patterns.get_mut(pattern_id) else {
            return Ok(false);
        };
        pattern.enabled = enabled;
        drop(patterns);
        self.bump_revision();
        info!(pattern_id, enabled, "pattern toggled");
        Ok(true)
    }

    /// Register a threshold rule. A rule with the same field and threshold
    /// type is replaced.
    pub fn add_threshold(&self, rule: ThresholdRule) -> Result<()> {
        rule.validate()?;
        let mut thresholds = self.thresholds.write().map_err(poisoned("threshold registry"))?;
        let field = rule.field_name.clone();
        match thresholds
            .iter_mut()
            .find(|t| t.field_name == rule.field_name && t.threshold_type == rule.threshold_type)
        {
            Some(existing) => *existing = rule,
            None => thresholds.push(rule),
        }
        drop(thresholds);
        self.bump_revision();
        info!(field = %field, "threshold rule registered");
        Ok(())
    }

    /// Remove every threshold rule on `field_name`; returns how many were removed.
    pub fn remove_threshold(&self, field_name: &str) -> Result<usize> {
        let mut thresholds = self.thresholds.write().map_err(poisoned("threshold registry"))?;
        let before = thresholds.len();
        thresholds.retain(|t| t.field_name != field_name);
        let removed = before - thresholds.len();
        drop(thresholds);
        if removed > 0 {
            self.bump_revision();
            info!(field = field_name, removed, "threshold rules removed");
        }
        Ok(removed)
    }

    /// Register a custom rule handler. Patterns with this id and method
    /// `CUSTOM_RULE` become acceptable to [`add_pattern`](Self::add_pattern).
    pub fn register_rule_handler<F>(&self, pattern_id: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&AnomalyPattern, &Dataset) -> Result<Vec<AnomalyResult>> + Send + Sync + 'static,
    {
        let pattern_id = pattern_id.into();
        self.handlers
            .write()
            .map_err(poisoned("rule handlers"))?
            .register(pattern_id.clone(), handler);
        self.bump_revision();
        info!(pattern_id = %pattern_id, "rule handler registered");
        Ok(())
    }

    /// Register every pattern and threshold the loader holds. Rules that
    /// fail validation are logged and counted, not fatal.
    pub fn load_rules(&self, loader: &RuleLoader) -> Result<RuleLoadSummary> {
        let mut summary = RuleLoadSummary::default();

        for pattern in loader.patterns() {
            let id = pattern.pattern_id.clone();
            match self.add_pattern(pattern) {
                Ok(()) => summary.patterns += 1,
                Err(e @ DetectError::LockPoisoned(_)) => return Err(e),
                Err(e) => {
                    warn!(pattern_id = %id, error = %e, "rejected pattern from rules directory");
                    summary.rejected += 1;
                }
            }
        }

        for rule in loader.thresholds() {
            let field = rule.field_name.clone();
            match self.add_threshold(rule) {
                Ok(()) => summary.thresholds += 1,
                Err(e @ DetectError::LockPoisoned(_)) => return Err(e),
                Err(e) => {
                    warn!(field = %field, error = %e, "rejected threshold from rules directory");
                    summary.rejected += 1;
                }
            }
        }

        info!(
            patterns = summary.patterns,
            thresholds = summary.thresholds,
            rejected = summary.rejected,
            rules_dir = %loader.rules_dir().display(),
            "rules loaded"
        );
        Ok(summary)
    }
}
