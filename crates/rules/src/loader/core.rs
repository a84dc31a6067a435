//! Core [`RuleLoader`] struct: filesystem-backed rule loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tenderscope_core::{AnomalyPattern, ThresholdRule};
use tracing::{info, warn};

use crate::schema::{RuleDocument, RuleEnvelope};

use super::error::{LoadResult, LoadStatus, Result, RuleError};

/// Parse one YAML document via two-pass deserialization and check that it
/// converts into a valid pattern or threshold rule.
///
/// First pass: deserialize as [`RuleEnvelope`] to read the `kind` field.
/// Second pass: reconstruct and deserialize into the kind-specific type.
pub fn parse_document(contents: &str) -> Result<RuleDocument> {
    let envelope: RuleEnvelope = serde_yaml::from_str(contents)?;

    if envelope.metadata.id.is_empty() {
        return Err(RuleError::Validation(
            "rule metadata.id must not be empty".to_string(),
        ));
    }

    let doc = envelope.parse_full().map_err(|e| {
        RuleError::Validation(format!("failed to parse rule '{}': {}", envelope.metadata.id, e))
    })?;

    match &doc {
        RuleDocument::Pattern(rule) => {
            rule.to_pattern()?;
        }
        RuleDocument::Threshold(rule) => {
            rule.to_threshold()?;
        }
    }
    Ok(doc)
}

/// Filesystem-backed rule loader.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files and keeps
/// the parsed documents keyed by `metadata.id`. A later file with the same
/// id replaces the earlier one.
pub struct RuleLoader {
    /// Root directory containing rule YAML files.
    rules_dir: PathBuf,
    /// All loaded documents keyed by `metadata.id`.
    documents: BTreeMap<String, RuleDocument>,
}

impl RuleLoader {
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            rules_dir: rules_dir.into(),
            documents: BTreeMap::new(),
        }
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Recursively scan the rules directory and load all YAML files.
    ///
    /// Dotfiles and non-YAML files are skipped. Parse errors are reported
    /// per-file but do not abort the scan. A missing root directory is an error.
    pub fn load_all(&mut self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        let root = self.rules_dir.clone();
        if !root.is_dir() {
            return Err(RuleError::Validation(format!(
                "rules directory '{}' does not exist",
                root.display()
            )));
        }
        self.scan_dir_recursive(&root, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&mut self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        // Deterministic order so duplicate ids resolve the same way every time.
        entries.sort();

        for path in entries {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);

            if !is_yaml {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(doc) => {
                    let rule_id = doc.metadata().id.clone();
                    info!(rule_id = %rule_id, kind = %doc.kind(), path = %path.display(), "loaded rule");
                    self.documents.insert(rule_id.clone(), doc);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { rule_id },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse a single YAML file into a [`RuleDocument`].
    pub fn load_file(&self, path: &Path) -> Result<RuleDocument> {
        let contents = fs::read_to_string(path)?;
        parse_document(&contents)
    }

    pub fn documents(&self) -> impl Iterator<Item = &RuleDocument> {
        self.documents.values()
    }

    pub fn get(&self, id: &str) -> Option<&RuleDocument> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All loaded pattern documents converted to detector patterns.
    pub fn patterns(&self) -> Vec<AnomalyPattern> {
        self.documents
            .values()
            .filter_map(|d| d.as_pattern())
            .filter_map(|r| match r.to_pattern() {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(rule_id = %r.metadata.id, error = %e, "skipping invalid pattern");
                    None
                }
            })
            .collect()
    }

    /// All loaded threshold documents converted to detector threshold rules.
    pub fn thresholds(&self) -> Vec<ThresholdRule> {
        self.documents
            .values()
            .filter_map(|d| d.as_threshold())
            .filter_map(|r| match r.to_threshold() {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(rule_id = %r.metadata.id, error = %e, "skipping invalid threshold");
                    None
                }
            })
            .collect()
    }
}
