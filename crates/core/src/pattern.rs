//! Configurable detection rules: anomaly patterns and static threshold rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{CoreError, Result};
use crate::finding::{AnomalyType, DetectionMethod, Severity};

/// How a [`ThresholdRule`] bound is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    Upper,
    Lower,
    Range,
    Percentage,
}

/// A scalar bound or an inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Scalar(f64),
    Range(f64, f64),
}

/// A violated bound and how far past it the value landed, relative to the
/// bound's magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub bound: f64,
    pub score: f64,
}

/// A static bound check on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub field_name: String,
    pub threshold_type: ThresholdType,
    pub threshold_value: ThresholdValue,
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ThresholdRule {
    /// Build and validate a rule. `range` requires a `(min, max)` value; the
    /// other types require a scalar.
    pub fn new(
        field_name: impl Into<String>,
        threshold_type: ThresholdType,
        threshold_value: ThresholdValue,
        severity: Severity,
    ) -> Result<Self> {
        let rule = Self {
            field_name: field_name.into(),
            threshold_type,
            threshold_value,
            severity,
            enabled: true,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| CoreError::InvalidThreshold {
            field: self.field_name.clone(),
            reason: reason.to_string(),
        };
        if self.field_name.is_empty() {
            return Err(invalid("field name must not be empty"));
        }
        match (self.threshold_type, self.threshold_value) {
            (ThresholdType::Range, ThresholdValue::Range(min, max)) => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(invalid("range bounds must be finite"));
                }
                if min > max {
                    return Err(invalid("range min is greater than max"));
                }
            }
            (ThresholdType::Range, ThresholdValue::Scalar(_)) => {
                return Err(invalid("range threshold requires a (min, max) pair"))
            }
            (_, ThresholdValue::Range(..)) => {
                return Err(invalid("only range thresholds take a (min, max) pair"))
            }
            (ThresholdType::Percentage, ThresholdValue::Scalar(v)) if v < 0.0 => {
                return Err(invalid("percentage threshold must not be negative"))
            }
            (_, ThresholdValue::Scalar(v)) if !v.is_finite() => {
                return Err(invalid("threshold must be finite"))
            }
            _ => {}
        }
        Ok(())
    }

    /// Evaluate the predicate for one value. Pure; returns the violation, if any.
    pub fn violation(&self, value: f64) -> Option<Violation> {
        match (self.threshold_type, self.threshold_value) {
            (ThresholdType::Upper, ThresholdValue::Scalar(bound)) if value > bound => Some(Violation {
                bound,
                score: relative(value - bound, bound.abs()),
            }),
            (ThresholdType::Lower, ThresholdValue::Scalar(bound)) if value < bound => Some(Violation {
                bound,
                score: relative(bound - value, bound.abs()),
            }),
            (ThresholdType::Percentage, ThresholdValue::Scalar(bound)) if value.abs() > bound => {
                Some(Violation {
                    bound,
                    score: relative(value.abs() - bound, bound),
                })
            }
            (ThresholdType::Range, ThresholdValue::Range(min, max)) => {
                let width = max - min;
                if value < min {
                    Some(Violation { bound: min, score: relative(min - value, width) })
                } else if value > max {
                    Some(Violation { bound: max, score: relative(value - max, width) })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Distance normalized by a magnitude; raw distance when the magnitude is 0.
fn relative(distance: f64, magnitude: f64) -> f64 {
    if magnitude > f64::EPSILON {
        distance / magnitude
    } else {
        distance
    }
}

/// A named, configurable detection rule over a set of indicator fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPattern {
    pub pattern_id: String,
    pub pattern_name: String,
    pub pattern_type: AnomalyType,
    #[serde(default)]
    pub description: String,
    pub indicators: Vec<String>,
    #[serde(default)]
    pub threshold_config: BTreeMap<String, f64>,
    pub detection_method: DetectionMethod,
    /// Severity per named band (e.g. `"delay"`, `"critical_delay"`). Handlers
    /// fall back to their built-in severity when a band is absent.
    #[serde(default)]
    pub severity_mapping: BTreeMap<String, Severity>,
    /// Findings below this confidence are dropped.
    #[serde(default)]
    pub confidence_threshold: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AnomalyPattern {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| CoreError::InvalidPattern {
            id: self.pattern_id.clone(),
            reason: reason.to_string(),
        };
        if self.pattern_id.is_empty() {
            return Err(invalid("pattern_id must not be empty"));
        }
        if self.indicators.is_empty() {
            return Err(invalid("at least one indicator field is required"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid("confidence_threshold must be within [0, 1]"));
        }
        Ok(())
    }

    /// Numeric parameter from `threshold_config`, or the default.
    pub fn param(&self, name: &str, default: f64) -> f64 {
        self.threshold_config.get(name).copied().unwrap_or(default)
    }

    /// Severity for a named band, or the default.
    pub fn severity_for(&self, band: &str, default: Severity) -> Severity {
        self.severity_mapping.get(band).copied().unwrap_or(default)
    }

    /// Indicator fields present in the dataset, in declaration order.
    pub fn present_indicators<'a>(&'a self, dataset: &Dataset) -> Vec<&'a str> {
        self.indicators
            .iter()
            .map(|s| s.as_str())
            .filter(|name| dataset.has_column(name))
            .collect()
    }

    /// A pattern applies when at least half of its indicators are present.
    pub fn applies_to(&self, dataset: &Dataset) -> bool {
        !self.indicators.is_empty()
            && self.present_indicators(dataset).len() * 2 >= self.indicators.len()
    }
}

fn default_true() -> bool {
    true
}
