//! Custom rule handlers for the built-in patterns.

use tenderscope_core::{AnomalyPattern, AnomalyResult, AnomalyType, Dataset, DetectionMethod, Severity};

use super::tag;
use crate::error::Result;
use crate::strategies::behavioral::supplier_column;

/// |budget_change_rate| (percent) above `percentage_change`; the severe band
/// applies above `severe_change`.
pub(super) fn budget_spike(pattern: &AnomalyPattern, dataset: &Dataset) -> Result<Vec<AnomalyResult>> {
    let Some(rates) = dataset.numeric("budget_change_rate") else {
        return Ok(Vec::new());
    };
    let limit = pattern.param("percentage_change", 50.0);
    let severe = pattern.param("severe_change", 100.0);

    let findings = rates
        .iter()
        .enumerate()
        .filter(|(_, rate)| rate.abs() > limit)
        .map(|(row, &rate)| {
            let severity = if rate.abs() > severe {
                pattern.severity_for("severe_spike", Severity::High)
            } else {
                pattern.severity_for("spike", Severity::Medium)
            };
            let mut finding = AnomalyResult::new(pattern.pattern_type, DetectionMethod::CustomRule, severity)
                .with_scores(0.9, rate.abs() / limit.max(f64::EPSILON))
                .with_text(
                    "Abnormal budget change",
                    format!("Budget changed by {:.1}%, above the allowed {:.1}%", rate, limit),
                )
                .with_field("budget_change_rate")
                .with_original(rate)
                .with_threshold(limit)
                .with_context("row_index", row);
            if let Some(amount) = dataset.value("budget_amount", row) {
                finding = finding.with_context("budget_amount", amount);
            }
            tag(finding, pattern)
        })
        .collect();
    Ok(findings)
}

/// delay_days beyond `delay_threshold` (critical beyond `critical_delay`), or
/// below `acceleration_threshold` for suspiciously early completion.
pub(super) fn timeline_deviation(pattern: &AnomalyPattern, dataset: &Dataset) -> Result<Vec<AnomalyResult>> {
    let Some(delays) = dataset.numeric("delay_days") else {
        return Ok(Vec::new());
    };
    let delay_threshold = pattern.param("delay_threshold", 30.0);
    let critical_delay = pattern.param("critical_delay", 60.0);
    let acceleration = pattern.param("acceleration_threshold", -30.0);

    let mut findings = Vec::new();
    for (row, &delay) in delays.iter().enumerate() {
        let finding = if delay > delay_threshold {
            let severity = if delay > critical_delay {
                pattern.severity_for("critical_delay", Severity::Critical)
            } else {
                pattern.severity_for("delay", Severity::High)
            };
            AnomalyResult::new(pattern.pattern_type, DetectionMethod::CustomRule, severity)
                .with_scores(0.95, delay / delay_threshold.max(f64::EPSILON))
                .with_text(
                    "Project timeline delay",
                    format!("Project is {} days late (threshold {})", delay, delay_threshold),
                )
                .with_threshold(delay_threshold)
        } else if delay < acceleration {
            AnomalyResult::new(
                pattern.pattern_type,
                DetectionMethod::CustomRule,
                pattern.severity_for("early_completion", Severity::Medium),
            )
            .with_scores(0.8, delay.abs() / acceleration.abs().max(f64::EPSILON))
            .with_text(
                "Abnormally early completion",
                format!("Project finished {} days ahead of plan", -delay),
            )
            .with_threshold(acceleration)
        } else {
            continue;
        };

        findings.push(tag(
            finding
                .with_field("delay_days")
                .with_original(delay)
                .with_context("row_index", row),
            pattern,
        ));
    }
    Ok(findings)
}

/// Rows where a supplier both bids above `bid_frequency` and wins above
/// `win_rate`.
///
/// Findings share the behavioral strategy's win-rate dedup key (behavioral
/// type, `win_rate` field, win rate as the original value), so a row both
/// checks flag is reported once.
pub(super) fn supplier_behavior(pattern: &AnomalyPattern, dataset: &Dataset) -> Result<Vec<AnomalyResult>> {
    let (Some(frequencies), Some(win_rates)) = (dataset.numeric("bid_frequency"), dataset.numeric("win_rate")) else {
        return Ok(Vec::new());
    };
    let max_frequency = pattern.param("bid_frequency", 20.0);
    let max_win_rate = pattern.param("win_rate", 0.8);
    let supplier_col = supplier_column(dataset);

    let findings = frequencies
        .iter()
        .zip(win_rates)
        .enumerate()
        .filter(|(_, (freq, rate))| **freq > max_frequency && **rate > max_win_rate)
        .map(|(row, (&freq, &rate))| {
            let score = (freq / max_frequency.max(f64::EPSILON) + rate / max_win_rate.max(f64::EPSILON)) / 2.0;
            let mut finding = AnomalyResult::new(
                AnomalyType::Behavioral,
                DetectionMethod::CustomRule,
                pattern.severity_for("concentrated_winning", Severity::High),
            )
            .with_scores(0.85, score)
            .with_text(
                "Concentrated winning pattern",
                format!(
                    "Supplier bid {} times and won {:.0}% of bids",
                    freq,
                    rate * 100.0
                ),
            )
            .with_field("win_rate")
            .with_original(rate)
            .with_threshold(max_win_rate)
            .with_context("row_index", row)
            .with_metadata("bid_frequency", freq);
            if let Some(id) = supplier_col.and_then(|col| dataset.identifier(col, row)) {
                finding = finding.with_context("supplier_id", id);
            }
            tag(finding, pattern)
        })
        .collect();
    Ok(findings)
}
