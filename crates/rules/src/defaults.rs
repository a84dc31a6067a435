//! Built-in patterns and threshold rules registered by a fresh detector.

use std::collections::BTreeMap;

use tenderscope_core::{
    AnomalyPattern, AnomalyType, DetectionMethod, Severity, ThresholdRule, ThresholdType,
    ThresholdValue,
};

pub const BUDGET_SPIKE: &str = "budget_spike";
pub const TIMELINE_DEVIATION: &str = "timeline_deviation";
pub const SUPPLIER_BEHAVIOR: &str = "supplier_behavior";
pub const PRICE_ANOMALY: &str = "price_anomaly";

fn params(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn severities(pairs: &[(&str, Severity)]) -> BTreeMap<String, Severity> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The four default anomaly patterns.
pub fn default_patterns() -> Vec<AnomalyPattern> {
    vec![
        AnomalyPattern {
            pattern_id: BUDGET_SPIKE.to_string(),
            pattern_name: "Budget spike".to_string(),
            pattern_type: AnomalyType::Financial,
            description: "Approved budget changed by more than the allowed percentage".to_string(),
            indicators: strings(&["budget_change_rate", "budget_amount"]),
            // budget_change_rate is expressed in percent.
            threshold_config: params(&[("percentage_change", 50.0), ("severe_change", 100.0)]),
            detection_method: DetectionMethod::CustomRule,
            severity_mapping: severities(&[("spike", Severity::Medium), ("severe_spike", Severity::High)]),
            confidence_threshold: 0.6,
            enabled: true,
        },
        AnomalyPattern {
            pattern_id: TIMELINE_DEVIATION.to_string(),
            pattern_name: "Timeline deviation".to_string(),
            pattern_type: AnomalyType::Temporal,
            description: "Project delivery far behind or suspiciously ahead of plan".to_string(),
            indicators: strings(&["delay_days", "actual_duration"]),
            threshold_config: params(&[
                ("delay_threshold", 30.0),
                ("critical_delay", 60.0),
                ("acceleration_threshold", -30.0),
            ]),
            detection_method: DetectionMethod::CustomRule,
            severity_mapping: severities(&[
                ("delay", Severity::High),
                ("critical_delay", Severity::Critical),
                ("early_completion", Severity::Medium),
            ]),
            confidence_threshold: 0.6,
            enabled: true,
        },
        AnomalyPattern {
            pattern_id: SUPPLIER_BEHAVIOR.to_string(),
            pattern_name: "Supplier behavior".to_string(),
            pattern_type: AnomalyType::Behavioral,
            description: "Supplier bids very often and wins most of what it bids on".to_string(),
            indicators: strings(&["bid_frequency", "win_rate", "supplier_id"]),
            threshold_config: params(&[("bid_frequency", 20.0), ("win_rate", 0.8)]),
            detection_method: DetectionMethod::CustomRule,
            severity_mapping: severities(&[("concentrated_winning", Severity::High)]),
            confidence_threshold: 0.6,
            enabled: true,
        },
        AnomalyPattern {
            pattern_id: PRICE_ANOMALY.to_string(),
            pattern_name: "Price anomaly".to_string(),
            pattern_type: AnomalyType::Pricing,
            description: "Prices far outside the interquartile band of the batch".to_string(),
            indicators: strings(&["unit_price", "bid_price", "contract_amount"]),
            threshold_config: params(&[("iqr_multiplier", 1.5)]),
            detection_method: DetectionMethod::Iqr,
            severity_mapping: severities(&[("outlier", Severity::Medium)]),
            confidence_threshold: 0.6,
            enabled: true,
        },
    ]
}

/// The default static threshold rules.
pub fn default_thresholds() -> Vec<ThresholdRule> {
    let rule = |field: &str, threshold_type, threshold_value, severity| ThresholdRule {
        field_name: field.to_string(),
        threshold_type,
        threshold_value,
        severity,
        enabled: true,
    };
    vec![
        rule(
            "budget_execution_rate",
            ThresholdType::Range,
            ThresholdValue::Range(0.0, 1.2),
            Severity::High,
        ),
        rule("bid_count", ThresholdType::Lower, ThresholdValue::Scalar(3.0), Severity::Medium),
        rule(
            "price_deviation_rate",
            ThresholdType::Percentage,
            ThresholdValue::Scalar(0.3),
            Severity::High,
        ),
        rule(
            "single_source_ratio",
            ThresholdType::Upper,
            ThresholdValue::Scalar(0.5),
            Severity::Medium,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        for p in default_patterns() {
            p.validate().unwrap();
        }
        for t in default_thresholds() {
            t.validate().unwrap();
        }
    }

    #[test]
    fn pattern_ids_are_unique() {
        let mut ids: Vec<String> = default_patterns().into_iter().map(|p| p.pattern_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}
