//! `ThresholdRule` rule documents.

use serde::{Deserialize, Serialize};
use tenderscope_core::{CoreError, Severity, ThresholdRule, ThresholdType, ThresholdValue};

use super::CommonMetadata;

/// Top-level threshold rule document parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdRuleDoc {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub spec: ThresholdSpec,
}

/// The bound itself. `threshold_value` is a number, or `[min, max]` for ranges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdSpec {
    pub field_name: String,
    pub threshold_type: ThresholdType,
    pub threshold_value: ThresholdValue,
    pub severity: Severity,
}

impl ThresholdRuleDoc {
    pub fn to_threshold(&self) -> Result<ThresholdRule, CoreError> {
        let mut rule = ThresholdRule::new(
            self.spec.field_name.clone(),
            self.spec.threshold_type,
            self.spec.threshold_value,
            self.spec.severity,
        )?;
        rule.enabled = self.metadata.enabled;
        Ok(rule)
    }
}
