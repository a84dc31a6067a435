//! Supplier bidding behavior checks.

use tenderscope_core::{AnomalyResult, AnomalyType, Dataset, DetectionMethod, Severity};

use super::{DetectionKind, DetectionStrategy, StrategyContext};
use crate::error::Result;

const SUPPLIER_MARKER: &str = "supplier";
const SUPPLIER_ID: &str = "supplier_id";

/// Flags suppliers that bid unusually often or win unusually often.
/// Only runs when the dataset carries a supplier column.
pub struct BehavioralStrategy;

/// The column identifying the supplier: `supplier_id` if present, else the
/// first column whose name mentions a supplier.
pub(crate) fn supplier_column(dataset: &Dataset) -> Option<&str> {
    if dataset.has_column(SUPPLIER_ID) {
        return Some(SUPPLIER_ID);
    }
    dataset
        .column_names()
        .find(|name| name.to_ascii_lowercase().contains(SUPPLIER_MARKER))
}

impl DetectionStrategy for BehavioralStrategy {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Behavioral
    }

    fn detect(&self, ctx: &StrategyContext) -> Result<Vec<AnomalyResult>> {
        let dataset = &ctx.dataset;
        let Some(supplier_col) = supplier_column(dataset) else {
            return Ok(Vec::new());
        };
        let cfg = &ctx.config;
        let mut findings = Vec::new();

        for row in 0..dataset.row_count() {
            let supplier = dataset.identifier(supplier_col, row);
            let attribute = |f: AnomalyResult| -> AnomalyResult {
                let f = f.with_context("row_index", row);
                match &supplier {
                    Some(id) => f.with_context(SUPPLIER_ID, id.as_str()),
                    None => f,
                }
            };

            if let Some(freq) = dataset.value("bid_frequency", row) {
                if freq > cfg.bid_frequency_threshold {
                    findings.push(attribute(
                        AnomalyResult::new(AnomalyType::Behavioral, DetectionMethod::RuleBased, Severity::High)
                            .with_scores(0.85, freq / cfg.bid_frequency_threshold)
                            .with_text(
                                "Abnormally high bid frequency",
                                format!(
                                    "Supplier bid {} times, above the expected maximum of {}",
                                    freq, cfg.bid_frequency_threshold
                                ),
                            )
                            .with_field("bid_frequency")
                            .with_original(freq)
                            .with_threshold(cfg.bid_frequency_threshold),
                    ));
                }
            }

            if let Some(win_rate) = dataset.value("win_rate", row) {
                if win_rate > cfg.win_rate_threshold {
                    findings.push(attribute(
                        AnomalyResult::new(AnomalyType::Behavioral, DetectionMethod::RuleBased, Severity::High)
                            .with_scores(0.9, win_rate)
                            .with_text(
                                "Abnormally high win rate",
                                format!(
                                    "Supplier wins {:.0}% of its bids; possible improper competition",
                                    win_rate * 100.0
                                ),
                            )
                            .with_field("win_rate")
                            .with_original(win_rate)
                            .with_threshold(cfg.win_rate_threshold),
                    ));
                }
            }
        }

        Ok(findings)
    }
}
