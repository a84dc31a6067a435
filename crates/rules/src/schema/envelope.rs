//! First-pass header of a rule document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{CommonMetadata, RuleDocument, RuleKind};

/// The only document version this crate reads.
pub const API_VERSION: &str = "v1";

/// Header fields shared by every rule document. The kind-specific `spec`
/// block is kept as raw YAML until the concrete kind is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEnvelope {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    #[serde(flatten)]
    pub rest: serde_yaml::Value,
}

impl RuleEnvelope {
    pub fn rule_kind(&self) -> std::result::Result<RuleKind, String> {
        self.kind.parse()
    }

    /// Second pass: re-read the whole document as its concrete kind.
    pub fn parse_full(&self) -> std::result::Result<RuleDocument, String> {
        if self.api_version != API_VERSION {
            return Err(format!(
                "unsupported apiVersion '{}' (expected '{}')",
                self.api_version, API_VERSION
            ));
        }
        let raw = serde_yaml::to_value(self).map_err(|e| e.to_string())?;
        Ok(match self.rule_kind()? {
            RuleKind::AnomalyPattern => RuleDocument::Pattern(concrete(raw)?),
            RuleKind::ThresholdRule => RuleDocument::Threshold(concrete(raw)?),
        })
    }
}

fn concrete<T: DeserializeOwned>(raw: serde_yaml::Value) -> std::result::Result<T, String> {
    serde_yaml::from_value(raw).map_err(|e| e.to_string())
}
