//! Merging strategy output: deduplicate, rank, cap.

use std::cmp::Ordering;
use std::collections::HashSet;

use tenderscope_core::{AnomalyResult, SeverityOrder};

/// Drop findings whose dedup key was already seen. First occurrence wins and
/// relative order is preserved, so applying this twice changes nothing.
pub fn deduplicate(findings: Vec<AnomalyResult>) -> Vec<AnomalyResult> {
    let mut seen = HashSet::with_capacity(findings.len());
    findings
        .into_iter()
        .filter(|f| seen.insert(f.dedup_key()))
        .collect()
}

/// Stable sort: severity first (per `order`), then descending confidence.
pub fn sort_findings(findings: &mut [AnomalyResult], order: SeverityOrder) {
    findings.sort_by(|a, b| compare(a, b, order));
}

fn compare(a: &AnomalyResult, b: &AnomalyResult, order: SeverityOrder) -> Ordering {
    let by_severity = match order {
        SeverityOrder::Rank => a.severity.rank().cmp(&b.severity.rank()),
        // Alphabetical labels: critical, high, info, low, medium.
        SeverityOrder::Legacy => a.severity.label().cmp(b.severity.label()),
    };
    by_severity.then_with(|| b.confidence_score.total_cmp(&a.confidence_score))
}

/// Deduplicate, sort and truncate to `cap` findings.
pub fn finalize(findings: Vec<AnomalyResult>, order: SeverityOrder, cap: usize) -> Vec<AnomalyResult> {
    let mut merged = deduplicate(findings);
    sort_findings(&mut merged, order);
    merged.truncate(cap);
    merged
}
