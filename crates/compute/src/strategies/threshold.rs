//! Static bound checks from the threshold rule registry.

use tenderscope_core::{AnomalyResult, AnomalyType, DetectionMethod, ThresholdRule};
use tracing::warn;

use super::{DetectionKind, DetectionStrategy, StrategyContext};
use crate::error::Result;

pub struct ThresholdStrategy;

impl DetectionStrategy for ThresholdStrategy {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Threshold
    }

    fn detect(&self, ctx: &StrategyContext) -> Result<Vec<AnomalyResult>> {
        let dataset = &ctx.dataset;
        let mut findings = Vec::new();

        for rule in ctx.thresholds.iter().filter(|r| r.enabled) {
            if !dataset.has_column(&rule.field_name) {
                continue;
            }
            let Some(values) = dataset.numeric(&rule.field_name) else {
                warn!(field = %rule.field_name, "threshold field is not numeric; skipping rule");
                continue;
            };
            for (row, &value) in values.iter().enumerate() {
                if let Some(finding) = evaluate(rule, row, value) {
                    findings.push(finding);
                }
            }
        }

        Ok(findings)
    }
}

fn evaluate(rule: &ThresholdRule, row: usize, value: f64) -> Option<AnomalyResult> {
    let violation = rule.violation(value)?;
    Some(
        AnomalyResult::new(AnomalyType::Threshold, DetectionMethod::Threshold, rule.severity)
            .with_scores(0.9, violation.score)
            .with_text(
                format!("Threshold exceeded for {}", rule.field_name),
                format!(
                    "{} = {} violates the {:?} bound {}",
                    rule.field_name, value, rule.threshold_type, violation.bound
                ),
            )
            .with_field(rule.field_name.as_str())
            .with_original(value)
            .with_threshold(violation.bound)
            .with_deviation(value - violation.bound)
            .with_context("row_index", row)
            .with_metadata("threshold_type", format!("{:?}", rule.threshold_type).to_lowercase()),
    )
}

#[cfg(test)]
mod tests {
    use tenderscope_core::dataset::record;
    use tenderscope_core::{
        Dataset, DetectionInput, FieldValue, Severity, ThresholdType, ThresholdValue,
    };

    use super::*;

    fn ctx(rows: Vec<(&str, FieldValue)>, rules: Vec<ThresholdRule>) -> StrategyContext {
        let ds = Dataset::preprocess(DetectionInput::Record(record(rows))).unwrap();
        StrategyContext::new(ds).with_thresholds(rules)
    }

    #[test]
    fn upper_bound_violation() {
        let rule = ThresholdRule::new(
            "single_source_ratio",
            ThresholdType::Upper,
            ThresholdValue::Scalar(0.5),
            Severity::Medium,
        )
        .unwrap();
        let findings = ThresholdStrategy
            .detect(&ctx(vec![("single_source_ratio", FieldValue::from(0.75))], vec![rule]))
            .unwrap();
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(f.confidence_score, 0.9);
        assert!((f.anomaly_score - 0.5).abs() < 1e-12);
        assert_eq!(f.threshold_value, Some(0.5));
    }

    #[test]
    fn range_uses_width_and_disabled_rules_are_ignored() {
        let range = ThresholdRule::new(
            "budget_execution_rate",
            ThresholdType::Range,
            ThresholdValue::Range(0.0, 1.2),
            Severity::High,
        )
        .unwrap();
        let mut disabled = ThresholdRule::new(
            "budget_execution_rate",
            ThresholdType::Upper,
            ThresholdValue::Scalar(0.1),
            Severity::Low,
        )
        .unwrap();
        disabled.enabled = false;

        let findings = ThresholdStrategy
            .detect(&ctx(
                vec![("budget_execution_rate", FieldValue::from(1.5))],
                vec![range, disabled],
            ))
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert!((findings[0].anomaly_score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn missing_or_text_fields_are_skipped() {
        let rule =
            ThresholdRule::new("bid_count", ThresholdType::Lower, ThresholdValue::Scalar(3.0), Severity::Medium)
                .unwrap();
        let none = ThresholdStrategy
            .detect(&ctx(vec![("other", FieldValue::from(1.0))], vec![rule.clone()]))
            .unwrap();
        assert!(none.is_empty());
        let text = ThresholdStrategy
            .detect(&ctx(vec![("bid_count", FieldValue::from("few"))], vec![rule]))
            .unwrap();
        assert!(text.is_empty());
    }
}
