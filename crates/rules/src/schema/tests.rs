use tenderscope_core::{AnomalyType, DetectionMethod, Severity, ThresholdType, ThresholdValue};

use super::*;

const PATTERN_YAML: &str = r#"
apiVersion: v1
kind: AnomalyPattern
metadata:
  id: budget_spike
  name: Budget spike
  description: Sudden jump in a project's approved budget
  tags: [financial]
spec:
  pattern_type: financial
  detection_method: CUSTOM_RULE
  indicators: [budget_change_rate, budget_amount]
  threshold_config:
    percentage_change: 40.0
  severity_mapping:
    spike: medium
    severe_spike: high
  confidence_threshold: 0.6
"#;

const RANGE_YAML: &str = r#"
apiVersion: v1
kind: ThresholdRule
metadata:
  id: execution-rate-band
  name: Budget execution rate band
spec:
  field_name: budget_execution_rate
  threshold_type: range
  threshold_value: [0.0, 1.2]
  severity: high
"#;

fn parse(yaml: &str) -> RuleDocument {
    let envelope: RuleEnvelope = serde_yaml::from_str(yaml).unwrap();
    envelope.parse_full().unwrap()
}

#[test]
fn pattern_document_round_trips_into_pattern() {
    let doc = parse(PATTERN_YAML);
    assert_eq!(doc.kind(), RuleKind::AnomalyPattern);
    let pattern = doc.as_pattern().unwrap().to_pattern().unwrap();
    assert_eq!(pattern.pattern_id, "budget_spike");
    assert_eq!(pattern.pattern_type, AnomalyType::Financial);
    assert_eq!(pattern.detection_method, DetectionMethod::CustomRule);
    assert_eq!(pattern.param("percentage_change", 50.0), 40.0);
    assert_eq!(pattern.severity_for("severe_spike", Severity::Low), Severity::High);
    assert!(pattern.enabled);
}

#[test]
fn range_threshold_document() {
    let doc = parse(RANGE_YAML);
    let rule = doc.as_threshold().unwrap().to_threshold().unwrap();
    assert_eq!(rule.threshold_type, ThresholdType::Range);
    assert_eq!(rule.threshold_value, ThresholdValue::Range(0.0, 1.2));
}

#[test]
fn range_threshold_with_scalar_is_rejected() {
    let yaml = RANGE_YAML.replace("[0.0, 1.2]", "1.2");
    let doc = parse(&yaml);
    assert!(doc.as_threshold().unwrap().to_threshold().is_err());
}

#[test]
fn unknown_kind_is_an_error() {
    let yaml = PATTERN_YAML.replace("kind: AnomalyPattern", "kind: Mystery");
    let envelope: RuleEnvelope = serde_yaml::from_str(&yaml).unwrap();
    let err = envelope.parse_full().unwrap_err();
    assert!(err.contains("unknown rule kind"));
}

#[test]
fn unknown_spec_field_is_rejected() {
    let yaml = PATTERN_YAML.replace("confidence_threshold: 0.6", "confidence_threshold: 0.6\n  bogus: 1");
    let envelope: RuleEnvelope = serde_yaml::from_str(&yaml).unwrap();
    assert!(envelope.parse_full().is_err());
}

#[test]
fn unknown_api_version_is_rejected() {
    let yaml = PATTERN_YAML.replace("apiVersion: v1", "apiVersion: v2");
    let envelope: RuleEnvelope = serde_yaml::from_str(&yaml).unwrap();
    assert!(envelope.parse_full().unwrap_err().contains("unsupported apiVersion"));
}
