//! Per-column z-score and IQR tests.

use tenderscope_core::{stats, AnomalyResult, AnomalyType, DetectionMethod, Severity};

use super::{DetectionKind, DetectionStrategy, StrategyContext};
use crate::error::Result;

/// A value past the z-score threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ZScoreHit {
    pub row: usize,
    pub value: f64,
    pub z: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// A value outside the IQR fences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IqrHit {
    pub row: usize,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub median: f64,
    pub iqr: f64,
}

impl IqrHit {
    /// `|value - median| / IQR`, or 0 when the IQR is 0.
    pub fn score(&self) -> f64 {
        if self.iqr > 0.0 {
            (self.value - self.median).abs() / self.iqr
        } else {
            0.0
        }
    }

    pub fn violated_bound(&self) -> f64 {
        if self.value < self.lower {
            self.lower
        } else {
            self.upper
        }
    }
}

/// Values with `|v - mean| / s > threshold`, `s` the sample standard
/// deviation. Columns with fewer than 2 values or no spread yield nothing.
pub(crate) fn z_score_hits(values: &[f64], threshold: f64) -> Vec<ZScoreHit> {
    let (Some(mean), Some(std_dev)) = (stats::mean(values), stats::sample_std_dev(values)) else {
        return Vec::new();
    };
    if std_dev <= f64::EPSILON {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter_map(|(row, &value)| {
            let z = (value - mean).abs() / std_dev;
            (z > threshold).then_some(ZScoreHit {
                row,
                value,
                z,
                mean,
                std_dev,
            })
        })
        .collect()
}

/// Values outside `[Q1 - k·IQR, Q3 + k·IQR]`.
pub(crate) fn iqr_hits(values: &[f64], k: f64) -> Vec<IqrHit> {
    let (Some((q1, q3)), Some(median)) = (stats::quartiles(values), stats::median(values)) else {
        return Vec::new();
    };
    let iqr = q3 - q1;
    let lower = q1 - k * iqr;
    let upper = q3 + k * iqr;
    values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v < lower || v > upper)
        .map(|(row, &value)| IqrHit {
            row,
            value,
            lower,
            upper,
            median,
            iqr,
        })
        .collect()
}

/// Runs both tests over every numeric column. The two tests may flag the
/// same value; the merge step collapses those.
pub struct StatisticalStrategy;

impl DetectionStrategy for StatisticalStrategy {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Statistical
    }

    fn cpu_bound(&self) -> bool {
        true
    }

    fn detect(&self, ctx: &StrategyContext) -> Result<Vec<AnomalyResult>> {
        let cfg = &ctx.config;
        let mut findings = Vec::new();

        for (column, values) in ctx.dataset.numeric_columns() {
            for hit in z_score_hits(values, cfg.z_score_threshold) {
                findings.push(z_score_finding(column, &hit, cfg.z_score_threshold));
            }
            for hit in iqr_hits(values, cfg.iqr_multiplier) {
                findings.push(iqr_finding(column, &hit));
            }
        }

        Ok(findings)
    }
}

fn z_score_finding(column: &str, hit: &ZScoreHit, threshold: f64) -> AnomalyResult {
    AnomalyResult::new(
        AnomalyType::Statistical,
        DetectionMethod::ZScore,
        Severity::from_z_score(hit.z),
    )
    .with_scores((hit.z / 5.0).min(1.0), hit.z)
    .with_text(
        format!("Statistical outlier in {}", column),
        format!(
            "{} = {} lies {:.2} standard deviations from the column mean {:.2}",
            column, hit.value, hit.z, hit.mean
        ),
    )
    .with_field(column)
    .with_original(hit.value)
    .with_expected(hit.mean)
    .with_deviation(hit.value - hit.mean)
    .with_threshold(threshold)
    .with_context("row_index", hit.row)
    .with_metadata("z_score", hit.z)
    .with_metadata("std_dev", hit.std_dev)
}

fn iqr_finding(column: &str, hit: &IqrHit) -> AnomalyResult {
    AnomalyResult::new(AnomalyType::Statistical, DetectionMethod::Iqr, Severity::Medium)
        .with_scores(0.8, hit.score())
        .with_text(
            format!("Value outside interquartile range in {}", column),
            format!(
                "{} = {} is outside the expected range [{:.2}, {:.2}]",
                column, hit.value, hit.lower, hit.upper
            ),
        )
        .with_field(column)
        .with_original(hit.value)
        .with_expected(hit.median)
        .with_deviation(hit.value - hit.median)
        .with_threshold(hit.violated_bound())
        .with_context("row_index", hit.row)
        .with_metadata("iqr", hit.iqr)
}
