//! Rule kind enum for two-pass deserialization dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    AnomalyPattern,
    ThresholdRule,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::AnomalyPattern => write!(f, "AnomalyPattern"),
            RuleKind::ThresholdRule => write!(f, "ThresholdRule"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "AnomalyPattern" => Ok(RuleKind::AnomalyPattern),
            "ThresholdRule" => Ok(RuleKind::ThresholdRule),
            other => Err(format!("unknown rule kind: '{}'", other)),
        }
    }
}
