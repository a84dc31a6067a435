//! Behavior profile registry.

use std::collections::BTreeMap;

use tenderscope_core::{AnomalyResult, BehaviorProfile, Dataset};

/// Dataset columns that identify an entity, with the entity type they imply.
const ENTITY_COLUMNS: &[(&str, &str)] = &[("supplier_id", "supplier"), ("entity_id", "entity")];

/// What one update pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub created: usize,
    pub updated: usize,
}

/// Profiles keyed by entity id. Profiles are created on first reference and
/// never removed.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, BehaviorProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: &str) -> Option<&BehaviorProfile> {
        self.profiles.get(entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BehaviorProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Fold one run into the registry.
    ///
    /// Every entity referenced by the dataset or by a finding's context gets a
    /// profile; those with attributed findings get their risk re-averaged.
    pub fn update(&mut self, dataset: &Dataset, findings: &[AnomalyResult], smoothing: f64) -> ProfileUpdate {
        let mut outcome = ProfileUpdate::default();

        for (entity_id, entity_type) in referenced_entities(dataset, findings) {
            let profile = self.profiles.entry(entity_id.clone()).or_insert_with(|| {
                outcome.created += 1;
                BehaviorProfile::new(entity_id.as_str(), entity_type)
            });

            let attributed: Vec<&AnomalyResult> = findings
                .iter()
                .filter(|f| f.references_entity(&entity_id))
                .collect();
            if profile.apply_findings(&attributed, smoothing).is_some() {
                outcome.updated += 1;
            }
        }

        outcome
    }
}

/// Distinct entity ids from identifier columns and finding context, in
/// sorted order. The first entity type seen for an id wins.
fn referenced_entities(dataset: &Dataset, findings: &[AnomalyResult]) -> BTreeMap<String, &'static str> {
    let mut entities = BTreeMap::new();

    for (column, entity_type) in ENTITY_COLUMNS {
        if !dataset.has_column(column) {
            continue;
        }
        for row in 0..dataset.row_count() {
            if let Some(id) = dataset.identifier(column, row).filter(|id| !id.is_empty()) {
                entities.entry(id).or_insert(*entity_type);
            }
        }
    }

    for finding in findings {
        for (id, entity_type) in finding.entity_refs() {
            entities.entry(id).or_insert(entity_type);
        }
    }

    entities
}

#[cfg(test)]
mod tests {
    use tenderscope_core::dataset::record;
    use tenderscope_core::{AnomalyType, DetectionInput, DetectionMethod, FieldValue, Severity};

    use super::*;

    fn dataset(ids: &[&str]) -> Dataset {
        let rows = ids
            .iter()
            .map(|id| record([("supplier_id", FieldValue::from(*id))]))
            .collect();
        Dataset::preprocess(DetectionInput::Table(rows)).unwrap()
    }

    fn finding_for(entity: &str, severity: Severity, confidence: f64) -> AnomalyResult {
        AnomalyResult::new(AnomalyType::Behavioral, DetectionMethod::RuleBased, severity)
            .with_scores(confidence, 1.0)
            .with_context("supplier_id", entity)
    }

    #[test]
    fn creates_profiles_for_dataset_entities_without_findings() {
        let mut reg = ProfileRegistry::new();
        let outcome = reg.update(&dataset(&["S1", "S2"]), &[], 0.3);
        assert_eq!(outcome, ProfileUpdate { created: 2, updated: 0 });
        assert_eq!(reg.get("S2").unwrap().risk_score, 0.0);
        assert_eq!(reg.get("S1").unwrap().entity_type, "supplier");
    }

    #[test]
    fn attributes_findings_via_context() {
        let mut reg = ProfileRegistry::new();
        let findings = vec![
            finding_for("S1", Severity::Critical, 0.9),
            finding_for("S9", Severity::High, 0.5),
        ];
        let outcome = reg.update(&dataset(&["S1"]), &findings, 0.3);
        assert_eq!(outcome, ProfileUpdate { created: 2, updated: 2 });

        let s1 = reg.get("S1").unwrap();
        assert!((s1.risk_score - 0.27).abs() < 1e-12);
        assert_eq!(s1.anomaly_history, vec![findings[0].anomaly_id.clone()]);
        assert!(reg.get("S9").is_some());
    }

    #[test]
    fn profiles_accumulate_across_runs() {
        let mut reg = ProfileRegistry::new();
        let ds = dataset(&["S1"]);
        reg.update(&ds, &[finding_for("S1", Severity::High, 1.0)], 0.5);
        let outcome = reg.update(&ds, &[finding_for("S1", Severity::High, 1.0)], 0.5);
        assert_eq!(outcome, ProfileUpdate { created: 0, updated: 1 });
        let s1 = reg.get("S1").unwrap();
        assert_eq!(s1.anomaly_history.len(), 2);
        assert!((s1.risk_score - 0.6).abs() < 1e-12);
    }
}
