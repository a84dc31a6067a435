//! YAML schema types with serde deserialization.
//!
//! - `RuleEnvelope`: lightweight first-pass header (apiVersion, kind, metadata)
//! - `RuleDocument`: enum dispatching to kind-specific types
//! - `PatternRule` / `ThresholdRuleDoc`: the two supported kinds

mod document;
mod envelope;
mod kind;
mod metadata;
mod pattern;
mod threshold;

pub use document::*;
pub use envelope::*;
pub use kind::*;
pub use metadata::*;
pub use pattern::*;
pub use threshold::*;

#[cfg(test)]
mod tests;
