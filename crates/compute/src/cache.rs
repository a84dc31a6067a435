//! Whole-run result cache.
//!
//! Reports are keyed by a SHA-256 fingerprint of everything that determines
//! a run's findings and expire after a TTL.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tenderscope_core::{DetectionConfig, DetectionInput};

use crate::report::AnomalyReport;
use crate::strategies::DetectionKind;

struct CachedReport {
    report: AnomalyReport,
    stored_at: Instant,
}

pub struct ResultCache {
    entries: LruCache<String, CachedReport>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Fresh cached report for `key`. Expired entries are evicted on access.
    pub fn get(&mut self, key: &str) -> Option<AnomalyReport> {
        let expired = self.entries.peek(key)?.stored_at.elapsed() > self.ttl;
        if expired {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|c| c.report.clone())
    }

    pub fn insert(&mut self, key: String, report: AnomalyReport) {
        self.entries.put(
            key,
            CachedReport {
                report,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    project_id: &'a str,
    input: serde_json::Value,
    config: &'a DetectionConfig,
    detection_types: &'a [DetectionKind],
    registry_revision: u64,
}

/// Hex SHA-256 over (project id, canonical input, config, requested
/// strategies, registry revision).
pub fn fingerprint(
    project_id: &str,
    input: &DetectionInput,
    config: &DetectionConfig,
    detection_types: &[DetectionKind],
    registry_revision: u64,
) -> Result<String, serde_json::Error> {
    let payload = FingerprintInput {
        project_id,
        input: input.to_json(),
        config,
        detection_types,
        registry_revision,
    };
    let bytes = serde_json::to_vec(&payload)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}
