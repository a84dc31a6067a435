//! Longitudinal per-entity behavior profiles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::finding::AnomalyResult;

/// Time span covered by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Rolling risk state for one entity (e.g. a supplier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub entity_id: String,
    pub entity_type: String,
    pub profile_period: ProfilePeriod,
    /// Cumulative finding counts per anomaly type.
    pub behavior_patterns: BTreeMap<String, u64>,
    pub statistical_features: BTreeMap<String, f64>,
    pub temporal_features: BTreeMap<String, f64>,
    /// Append-only list of finding ids attributed to this entity.
    pub anomaly_history: Vec<String>,
    /// Exponentially smoothed risk in [0, 1].
    pub risk_score: f64,
    pub created_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl BehaviorProfile {
    pub fn new(entity_id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            profile_period: ProfilePeriod { start: now, end: now },
            behavior_patterns: BTreeMap::new(),
            statistical_features: BTreeMap::new(),
            temporal_features: BTreeMap::new(),
            anomaly_history: Vec::new(),
            risk_score: 0.0,
            created_time: now,
            last_updated: now,
        }
    }

    /// Fold one run's findings into the profile.
    ///
    /// `new_risk = sum(weight(severity) * confidence) / count` and
    /// `risk = smoothing * new_risk + (1 - smoothing) * risk`. Returns the
    /// run's `new_risk`, or None (profile untouched) when `findings` is empty.
    pub fn apply_findings(&mut self, findings: &[&AnomalyResult], smoothing: f64) -> Option<f64> {
        if findings.is_empty() {
            return None;
        }

        let new_risk = findings
            .iter()
            .map(|f| f.severity.weight() * f.confidence_score)
            .sum::<f64>()
            / findings.len() as f64;

        let alpha = smoothing.clamp(0.0, 1.0);
        self.risk_score = (alpha * new_risk + (1.0 - alpha) * self.risk_score).clamp(0.0, 1.0);

        for f in findings {
            self.anomaly_history.push(f.anomaly_id.clone());
            *self
                .behavior_patterns
                .entry(f.anomaly_type.label().to_string())
                .or_default() += 1;
        }

        let now = Utc::now();
        self.statistical_features.insert("last_run_risk".to_string(), new_risk);
        self.statistical_features
            .insert("total_findings".to_string(), self.anomaly_history.len() as f64);
        *self
            .temporal_features
            .entry("flagged_runs".to_string())
            .or_insert(0.0) += 1.0;
        self.temporal_features
            .insert("last_flagged_ts".to_string(), now.timestamp() as f64);
        self.profile_period.end = now;
        self.last_updated = now;

        Some(new_risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{AnomalyType, DetectionMethod, Severity};

    fn finding(severity: Severity, confidence: f64) -> AnomalyResult {
        AnomalyResult::new(AnomalyType::Behavioral, DetectionMethod::RuleBased, severity)
            .with_scores(confidence, 1.0)
    }

    #[test]
    fn ema_matches_worked_example() {
        let mut p = BehaviorProfile::new("S1", "supplier");
        p.risk_score = 0.4;
        let f = finding(Severity::Critical, 0.9);
        let new_risk = p.apply_findings(&[&f], 0.3).unwrap();
        assert!((new_risk - 0.9).abs() < 1e-12);
        assert!((p.risk_score - 0.55).abs() < 1e-12);
        assert_eq!(p.anomaly_history, vec![f.anomaly_id.clone()]);
    }

    #[test]
    fn averages_weighted_confidence() {
        let mut p = BehaviorProfile::new("S1", "supplier");
        let a = finding(Severity::High, 0.85);
        let b = finding(Severity::High, 0.9);
        let new_risk = p.apply_findings(&[&a, &b], 0.3).unwrap();
        assert!((new_risk - 0.8 * 0.875).abs() < 1e-12);
        assert_eq!(p.behavior_patterns["behavioral"], 2);
        assert!(p.risk_score > 0.0);
    }

    #[test]
    fn empty_findings_leave_profile_alone() {
        let mut p = BehaviorProfile::new("S1", "supplier");
        let before = p.clone();
        assert!(p.apply_findings(&[], 0.3).is_none());
        assert_eq!(p, before);
    }
}
