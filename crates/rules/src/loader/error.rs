//! Loader errors and per-file load outcomes.

use std::path::PathBuf;

use tenderscope_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Well-formed YAML that is not a usable rule document (unknown kind,
    /// unsupported version, empty id, stray spec fields).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The document parsed but does not form a valid pattern or threshold.
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// What happened to one file during a directory scan.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded { rule_id: String },
    /// Dotfiles and non-YAML files.
    Skipped { reason: String },
    Failed { error: String },
}
