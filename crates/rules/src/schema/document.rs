//! Tagged union over all supported rule kinds.

use super::{CommonMetadata, PatternRule, RuleKind, ThresholdRuleDoc};

/// A parsed rule document of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleDocument {
    Pattern(PatternRule),
    Threshold(ThresholdRuleDoc),
}

impl RuleDocument {
    /// Shared metadata, regardless of kind.
    pub fn metadata(&self) -> &CommonMetadata {
        match self {
            RuleDocument::Pattern(r) => &r.metadata,
            RuleDocument::Threshold(r) => &r.metadata,
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            RuleDocument::Pattern(_) => RuleKind::AnomalyPattern,
            RuleDocument::Threshold(_) => RuleKind::ThresholdRule,
        }
    }

    pub fn as_pattern(&self) -> Option<&PatternRule> {
        match self {
            RuleDocument::Pattern(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_threshold(&self) -> Option<&ThresholdRuleDoc> {
        match self {
            RuleDocument::Threshold(r) => Some(r),
            _ => None,
        }
    }
}
