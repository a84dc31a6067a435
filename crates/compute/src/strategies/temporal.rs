//! Schedule delay and duration deviation checks.

use tenderscope_core::{AnomalyResult, AnomalyType, DetectionMethod, Severity};

use super::{DetectionKind, DetectionStrategy, StrategyContext};
use crate::error::Result;

pub struct TemporalStrategy;

impl DetectionStrategy for TemporalStrategy {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Temporal
    }

    fn detect(&self, ctx: &StrategyContext) -> Result<Vec<AnomalyResult>> {
        let dataset = &ctx.dataset;
        let cfg = &ctx.config;
        let mut findings = Vec::new();

        for row in 0..dataset.row_count() {
            if let Some(delay) = dataset.value("delay_days", row) {
                if delay > cfg.delay_days_threshold {
                    let severity = if delay > cfg.critical_delay_days {
                        Severity::Critical
                    } else {
                        Severity::High
                    };
                    findings.push(
                        AnomalyResult::new(AnomalyType::Temporal, DetectionMethod::RuleBased, severity)
                            .with_scores(0.95, delay / cfg.delay_days_threshold)
                            .with_text(
                                "Project schedule severely delayed",
                                format!("Project is {} days behind schedule", delay),
                            )
                            .with_field("delay_days")
                            .with_original(delay)
                            .with_threshold(cfg.delay_days_threshold)
                            .with_deviation(delay - cfg.delay_days_threshold)
                            .with_context("row_index", row),
                    );
                }
            }

            let (Some(planned), Some(actual)) = (
                dataset.value("planned_duration", row),
                dataset.value("actual_duration", row),
            ) else {
                continue;
            };
            if planned <= 0.0 {
                continue;
            }
            let ratio = (actual - planned).abs() / planned;
            if ratio > cfg.duration_deviation_threshold {
                findings.push(
                    AnomalyResult::new(AnomalyType::Temporal, DetectionMethod::RuleBased, Severity::Medium)
                        .with_scores(0.8, ratio)
                        .with_text(
                            "Project duration deviates from plan",
                            format!(
                                "Actual duration {} differs from planned {} by {:.0}%",
                                actual,
                                planned,
                                ratio * 100.0
                            ),
                        )
                        .with_fields(["planned_duration", "actual_duration"])
                        .with_original(actual)
                        .with_expected(planned)
                        .with_deviation(actual - planned)
                        .with_threshold(cfg.duration_deviation_threshold)
                        .with_context("row_index", row),
                );
            }
        }

        Ok(findings)
    }
}
