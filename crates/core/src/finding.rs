//! Findings (anomaly results) and the enums that classify them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Context keys that attribute a finding to a tracked entity, with the
/// entity type each key implies.
pub const ENTITY_KEYS: &[(&str, &str)] = &[("supplier_id", "supplier"), ("entity_id", "entity")];

/// Ordinal urgency of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Lowercase label, as serialized.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// Urgency rank, 0 = most urgent.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    /// Weight used by the behavior-profile risk average.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::High => 0.8,
            Severity::Medium => 0.6,
            Severity::Low => 0.4,
            Severity::Info => 0.2,
        }
    }

    /// Banding for z-scores: >=5 critical, >=4 high, >=3 medium.
    pub fn from_z_score(z: f64) -> Self {
        if z >= 5.0 {
            Severity::Critical
        } else if z >= 4.0 {
            Severity::High
        } else if z >= 3.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Banding for outlier-model scores: >=0.8 critical, >=0.6 high, >=0.4 medium.
    pub fn from_outlier_score(score: f64) -> Self {
        if score >= 0.8 {
            Severity::Critical
        } else if score >= 0.6 {
            Severity::High
        } else if score >= 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What kind of irregularity a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Statistical,
    Behavioral,
    Temporal,
    Pattern,
    Outlier,
    Threshold,
    Financial,
    Pricing,
}

impl AnomalyType {
    pub fn label(self) -> &'static str {
        match self {
            AnomalyType::Statistical => "statistical",
            AnomalyType::Behavioral => "behavioral",
            AnomalyType::Temporal => "temporal",
            AnomalyType::Pattern => "pattern",
            AnomalyType::Outlier => "outlier",
            AnomalyType::Threshold => "threshold",
            AnomalyType::Financial => "financial",
            AnomalyType::Pricing => "pricing",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The technique that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionMethod {
    ZScore,
    Iqr,
    IsolationForest,
    LocalOutlierFactor,
    Threshold,
    CustomRule,
    RuleBased,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DetectionMethod::ZScore => "Z_SCORE",
            DetectionMethod::Iqr => "IQR",
            DetectionMethod::IsolationForest => "ISOLATION_FOREST",
            DetectionMethod::LocalOutlierFactor => "LOCAL_OUTLIER_FACTOR",
            DetectionMethod::Threshold => "THRESHOLD",
            DetectionMethod::CustomRule => "CUSTOM_RULE",
            DetectionMethod::RuleBased => "RULE_BASED",
        };
        f.write_str(s)
    }
}

/// Investigation status. Set by external workflow; the detector only emits `Detected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    #[default]
    Detected,
    Investigating,
    Confirmed,
    FalsePositive,
    Resolved,
}

/// One detected irregularity with its supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub anomaly_id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    /// Trust in the finding, in [0, 1].
    pub confidence_score: f64,
    /// Method-specific magnitude, >= 0. Not comparable across methods.
    pub anomaly_score: f64,
    pub title: String,
    pub description: String,
    pub affected_fields: Vec<String>,
    pub detection_method: DetectionMethod,
    pub detection_time: DateTime<Utc>,
    pub original_value: Value,
    pub expected_value: Option<f64>,
    pub deviation: Option<f64>,
    pub threshold_value: Option<f64>,
    pub context_data: BTreeMap<String, Value>,
    pub status: AnomalyStatus,
    pub metadata: BTreeMap<String, Value>,
}

impl AnomalyResult {
    pub fn new(anomaly_type: AnomalyType, detection_method: DetectionMethod, severity: Severity) -> Self {
        Self {
            anomaly_id: Uuid::new_v4().to_string(),
            anomaly_type,
            severity,
            confidence_score: 0.0,
            anomaly_score: 0.0,
            title: String::new(),
            description: String::new(),
            affected_fields: Vec::new(),
            detection_method,
            detection_time: Utc::now(),
            original_value: Value::Null,
            expected_value: None,
            deviation: None,
            threshold_value: None,
            context_data: BTreeMap::new(),
            status: AnomalyStatus::Detected,
            metadata: BTreeMap::new(),
        }
    }

    /// Confidence is clamped to [0, 1]; the anomaly score is floored at 0.
    pub fn with_scores(mut self, confidence: f64, anomaly_score: f64) -> Self {
        self.confidence_score = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        self.anomaly_score = if anomaly_score.is_finite() { anomaly_score.max(0.0) } else { 0.0 };
        self
    }

    pub fn with_text(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.title = title.into();
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.affected_fields.push(field.into());
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_original(mut self, value: impl Into<Value>) -> Self {
        self.original_value = value.into();
        self
    }

    pub fn with_expected(mut self, expected: f64) -> Self {
        self.expected_value = Some(expected);
        self
    }

    pub fn with_deviation(mut self, deviation: f64) -> Self {
        self.deviation = Some(deviation);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold_value = Some(threshold);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context_data.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Key under which findings from different strategies collapse:
    /// (type, affected fields joined in order, original value).
    pub fn dedup_key(&self) -> (AnomalyType, String, String) {
        (
            self.anomaly_type,
            self.affected_fields.join(","),
            self.original_value.to_string(),
        )
    }

    /// Entity ids this finding is attributed to via its context data.
    pub fn entity_refs(&self) -> impl Iterator<Item = (String, &'static str)> + '_ {
        ENTITY_KEYS.iter().filter_map(move |(key, entity_type)| {
            self.context_data.get(*key).and_then(entity_id_from).map(|id| (id, *entity_type))
        })
    }

    /// Whether the context data references the given entity id.
    pub fn references_entity(&self, entity_id: &str) -> bool {
        self.entity_refs().any(|(id, _)| id == entity_id)
    }
}

fn entity_id_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_score_banding() {
        assert_eq!(Severity::from_z_score(5.0), Severity::Critical);
        assert_eq!(Severity::from_z_score(4.2), Severity::High);
        assert_eq!(Severity::from_z_score(3.1), Severity::Medium);
        assert_eq!(Severity::from_z_score(2.0), Severity::Low);
    }

    #[test]
    fn outlier_banding() {
        assert_eq!(Severity::from_outlier_score(0.85), Severity::Critical);
        assert_eq!(Severity::from_outlier_score(0.6), Severity::High);
        assert_eq!(Severity::from_outlier_score(0.45), Severity::Medium);
        assert_eq!(Severity::from_outlier_score(0.1), Severity::Low);
    }

    #[test]
    fn scores_are_clamped() {
        let f = AnomalyResult::new(AnomalyType::Statistical, DetectionMethod::ZScore, Severity::Low)
            .with_scores(1.7, -3.0);
        assert_eq!(f.confidence_score, 1.0);
        assert_eq!(f.anomaly_score, 0.0);
    }

    #[test]
    fn dedup_key_ignores_id_and_method() {
        let a = AnomalyResult::new(AnomalyType::Temporal, DetectionMethod::RuleBased, Severity::High)
            .with_field("delay_days")
            .with_original(45.0);
        let b = AnomalyResult::new(AnomalyType::Temporal, DetectionMethod::CustomRule, Severity::Critical)
            .with_field("delay_days")
            .with_original(45.0);
        assert_ne!(a.anomaly_id, b.anomaly_id);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn entity_attribution_reads_context() {
        let f = AnomalyResult::new(AnomalyType::Behavioral, DetectionMethod::RuleBased, Severity::High)
            .with_context("supplier_id", "S1");
        assert!(f.references_entity("S1"));
        assert!(!f.references_entity("S2"));
        let refs: Vec<_> = f.entity_refs().collect();
        assert_eq!(refs, vec![("S1".to_string(), "supplier")]);
    }

    #[test]
    fn method_serializes_screaming_snake() {
        let s = serde_json::to_string(&DetectionMethod::ZScore).unwrap();
        assert_eq!(s, "\"Z_SCORE\"");
        let s = serde_json::to_string(&DetectionMethod::Iqr).unwrap();
        assert_eq!(s, "\"IQR\"");
    }
}
