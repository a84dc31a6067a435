//! Unsupervised multivariate outlier models.
//!
//! All numeric columns are standardized per run, then scored by an isolation
//! forest and, for large enough batches, by the local outlier factor. Both
//! flag rows whose score lies above the `1 - contamination` quantile.
//! Without the `ml` feature the strategy logs a warning and finds nothing.

use tenderscope_core::AnomalyResult;

use super::{DetectionKind, DetectionStrategy, StrategyContext};
use crate::error::Result;

pub struct OutlierStrategy;

impl OutlierStrategy {
    /// Whether the outlier models are compiled in.
    pub const fn available() -> bool {
        cfg!(feature = "ml")
    }
}

impl DetectionStrategy for OutlierStrategy {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Outlier
    }

    fn cpu_bound(&self) -> bool {
        true
    }

    #[cfg(feature = "ml")]
    fn detect(&self, ctx: &StrategyContext) -> Result<Vec<AnomalyResult>> {
        Ok(models::detect(ctx))
    }

    #[cfg(not(feature = "ml"))]
    fn detect(&self, _ctx: &StrategyContext) -> Result<Vec<AnomalyResult>> {
        tracing::warn!("outlier models unavailable (built without the `ml` feature); skipping");
        Ok(Vec::new())
    }
}

#[cfg(feature = "ml")]
mod models {
    use tenderscope_core::{stats, AnomalyResult, AnomalyType, Dataset, DetectionMethod, Severity};
    use tracing::debug;

    use super::StrategyContext;
    use crate::algorithms::isolation_forest::IsolationForest;
    use crate::algorithms::lof::local_outlier_factor;
    use crate::algorithms::scaling::standardize;

    pub(super) fn detect(ctx: &StrategyContext) -> Vec<AnomalyResult> {
        let dataset = &ctx.dataset;
        let cfg = &ctx.config;
        let (columns, rows) = dataset.numeric_matrix();
        if columns.is_empty() || rows.len() < 2 {
            return Vec::new();
        }

        let scaled = standardize(&rows);
        let mut findings = Vec::new();

        let forest = IsolationForest::fit(&scaled, cfg.n_estimators, cfg.max_samples, cfg.random_state);
        let scores = forest.score_all(&scaled);
        let flagged = flag(&scores, cfg.contamination);
        debug!(rows = rows.len(), trees = forest.n_trees(), flagged = flagged.len(), "isolation forest scored");
        for row in flagged {
            findings.push(finding(dataset, &columns, row, scores[row], DetectionMethod::IsolationForest));
        }

        if rows.len() >= cfg.lof_min_rows {
            let k = cfg.lof_max_neighbors.min(rows.len() - 1);
            let factors = local_outlier_factor(&scaled, k);
            let flagged = flag(&factors, cfg.contamination);
            debug!(rows = rows.len(), k, flagged = flagged.len(), "local outlier factor scored");
            for row in flagged {
                findings.push(finding(
                    dataset,
                    &columns,
                    row,
                    factors[row],
                    DetectionMethod::LocalOutlierFactor,
                ));
            }
        }

        findings
    }

    /// Rows scoring strictly above the `1 - contamination` quantile.
    fn flag(scores: &[f64], contamination: f64) -> Vec<usize> {
        let Some(cutoff) = stats::percentile(scores, 100.0 * (1.0 - contamination)) else {
            return Vec::new();
        };
        scores
            .iter()
            .enumerate()
            .filter(|(_, &s)| s > cutoff)
            .map(|(row, _)| row)
            .collect()
    }

    fn finding(
        dataset: &Dataset,
        columns: &[String],
        row: usize,
        score: f64,
        method: DetectionMethod,
    ) -> AnomalyResult {
        let (title, model) = match method {
            DetectionMethod::LocalOutlierFactor => ("Local density outlier", "local_outlier_factor"),
            _ => ("Multivariate outlier", "isolation_forest"),
        };
        AnomalyResult::new(AnomalyType::Outlier, method, Severity::from_outlier_score(score))
            .with_scores((score.abs() * 2.0).min(1.0), score)
            .with_text(
                title,
                format!("Row {} is inconsistent with the rest of the batch (score {:.3})", row, score),
            )
            .with_fields(columns.iter().cloned())
            .with_original(dataset.numeric_row_snapshot(row))
            .with_context("row_index", row)
            .with_metadata("model", model)
    }

}

#[cfg(all(test, feature = "ml"))]
mod tests {
    use tenderscope_core::dataset::record;
    use tenderscope_core::{Dataset, DetectionInput, DetectionMethod, FieldValue, Record};

    use super::*;

    fn detect(rows: Vec<Record>) -> Vec<AnomalyResult> {
        let ds = Dataset::preprocess(DetectionInput::Table(rows)).unwrap();
        OutlierStrategy.detect(&StrategyContext::new(ds)).unwrap()
    }

    #[test]
    fn fewer_than_two_rows_yields_nothing() {
        assert!(detect(vec![record([("amount", 5.0), ("bids", 3.0)])]).is_empty());
        assert!(detect(vec![]).is_empty());
    }

    #[test]
    fn text_only_dataset_yields_nothing() {
        let rows = (0..30)
            .map(|i| record([("name", FieldValue::from(format!("p{}", i).as_str()))]))
            .collect();
        assert!(detect(rows).is_empty());
    }

    #[test]
    fn extreme_row_is_flagged_by_both_models() {
        let mut rows: Vec<Record> = (0..39)
            .map(|i| record([("amount", 100.0 + (i % 7) as f64), ("bids", 4.0 + (i % 3) as f64)]))
            .collect();
        rows.push(record([("amount", 5_000.0), ("bids", 40.0)]));
        let findings = detect(rows);

        let last_row = |m: DetectionMethod| {
            findings
                .iter()
                .any(|f| f.detection_method == m && f.context_data["row_index"] == 39)
        };
        assert!(last_row(DetectionMethod::IsolationForest));
        assert!(last_row(DetectionMethod::LocalOutlierFactor));

        let f = findings.iter().find(|f| f.context_data["row_index"] == 39).unwrap();
        assert_eq!(f.anomaly_type, tenderscope_core::AnomalyType::Outlier);
        assert_eq!(f.original_value["amount"], 5_000.0);
        assert_eq!(f.affected_fields, vec!["amount", "bids"]);
    }

    #[test]
    fn lof_needs_enough_rows() {
        let mut rows: Vec<Record> = (0..9)
            .map(|i| record([("amount", 100.0 + i as f64)]))
            .collect();
        rows.push(record([("amount", 9_999.0)]));
        let findings = detect(rows);
        assert!(findings
            .iter()
            .all(|f| f.detection_method == DetectionMethod::IsolationForest));
    }
}
