//! Filesystem rule loader.
//!
//! Scans the rules directory for YAML documents and parses each one via
//! two-pass deserialization (RuleEnvelope -> RuleDocument).

mod core;
mod error;


pub use self::core::{parse_document, RuleLoader};
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
