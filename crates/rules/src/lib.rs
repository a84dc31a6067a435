//! Declarative detection rules for the tenderscope anomaly engine.
//!
//! This crate provides:
//! - YAML documents for anomaly patterns and threshold rules, with serde deserialization
//! - The built-in default pattern and threshold sets
//! - A filesystem loader that scans a rules directory

pub mod defaults;
pub mod loader;
pub mod schema;

pub use defaults::{default_patterns, default_thresholds};
pub use loader::{LoadResult, LoadStatus, RuleError, RuleLoader};
pub use schema::{RuleDocument, RuleKind};
