//! `AnomalyPattern` rule documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tenderscope_core::{AnomalyPattern, AnomalyType, CoreError, DetectionMethod, Severity};

use super::CommonMetadata;

/// Top-level anomaly pattern document parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatternRule {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub spec: PatternSpec,
}

/// Detection parameters of a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatternSpec {
    pub pattern_type: AnomalyType,
    pub detection_method: DetectionMethod,
    pub indicators: Vec<String>,
    #[serde(default)]
    pub threshold_config: BTreeMap<String, f64>,
    #[serde(default)]
    pub severity_mapping: BTreeMap<String, Severity>,
    #[serde(default)]
    pub confidence_threshold: f64,
}

impl PatternRule {
    /// Convert into the detector's pattern type. The metadata id becomes the
    /// pattern id, so custom-rule handlers are looked up by it.
    pub fn to_pattern(&self) -> Result<AnomalyPattern, CoreError> {
        let pattern = AnomalyPattern {
            pattern_id: self.metadata.id.clone(),
            pattern_name: self.metadata.name.clone(),
            pattern_type: self.spec.pattern_type,
            description: self.metadata.description.clone().unwrap_or_default(),
            indicators: self.spec.indicators.clone(),
            threshold_config: self.spec.threshold_config.clone(),
            detection_method: self.spec.detection_method,
            severity_mapping: self.spec.severity_mapping.clone(),
            confidence_threshold: self.spec.confidence_threshold,
            enabled: self.metadata.enabled,
        };
        pattern.validate()?;
        Ok(pattern)
    }
}
