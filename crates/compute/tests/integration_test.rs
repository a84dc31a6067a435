/// Integration tests for the detector covering rule loading from disk,
/// a full six-strategy run over a procurement table, report serialization
/// and concurrent callers sharing one detector.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use tenderscope_compute::{AnomalyDetector, AnomalyReport, DetectionKind, RiskLevel};
use tenderscope_core::{AnomalyType, DetectionConfig, DetectionMethod, ThresholdType, ThresholdValue};
use tenderscope_rules::RuleLoader;

// ============================================================================
// Test Helpers
// ============================================================================

fn examples_dir() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/rules/examples")
}

fn loaded_examples() -> RuleLoader {
    let mut loader = RuleLoader::new(examples_dir());
    loader.load_all().expect("examples dir exists");
    loader
}

/// Thirty tenders from eight suppliers. Row 17 carries an inflated award,
/// row 23 had a single bidder and supplier S9 bids and wins far too often.
fn procurement_table() -> Value {
    let rows: Vec<Value> = (0..30)
        .map(|i| {
            let supplier = if i % 10 == 9 { "S9".to_string() } else { format!("S{}", i % 8) };
            let (bid_frequency, win_rate) = if supplier == "S9" { (32.0, 0.93) } else { (6.0 + (i % 5) as f64, 0.3) };
            json!({
                "tender_id": format!("T-{:03}", i),
                "supplier_id": supplier,
                "contract_amount": if i == 17 { 2_500_000.0 } else { 100_000.0 + (i as f64) * 1_250.0 },
                "bid_count": if i == 23 { 1.0 } else { 4.0 },
                "bid_frequency": bid_frequency,
                "win_rate": win_rate,
                "delay_days": if i == 5 { 120.0 } else { (i % 4) as f64 },
            })
        })
        .collect();
    Value::Array(rows)
}

fn context_str<'a>(report: &'a AnomalyReport, key: &str) -> Vec<&'a str> {
    report
        .anomalies
        .iter()
        .filter_map(|f| f.context_data.get(key).and_then(Value::as_str))
        .collect()
}

// ============================================================================
// Rule loading
// ============================================================================

#[test]
fn example_rules_register_on_top_of_defaults() {
    let detector = AnomalyDetector::new(DetectionConfig::default()).unwrap();
    let summary = detector.load_rules(&loaded_examples()).unwrap();

    assert_eq!(summary.patterns, 3);
    assert_eq!(summary.thresholds, 2);
    assert_eq!(summary.rejected, 0);

    let patterns = detector.patterns().unwrap();
    // supplier_behavior replaces the built-in pattern of the same id.
    assert_eq!(patterns.len(), 6);
    let supplier = patterns.iter().find(|p| p.pattern_id == "supplier_behavior").unwrap();
    assert_eq!(supplier.param("bid_frequency", 0.0), 15.0);
    let iqr = patterns.iter().find(|p| p.pattern_id == "unit-price-iqr").unwrap();
    assert!(!iqr.enabled);

    let thresholds = detector.thresholds().unwrap();
    assert_eq!(thresholds.len(), 4);
    let floor = thresholds
        .iter()
        .find(|t| t.field_name == "bid_count" && t.threshold_type == ThresholdType::Lower)
        .unwrap();
    assert_eq!(floor.threshold_value, ThresholdValue::Scalar(2.0));
}

#[test]
fn unresolvable_custom_rule_is_rejected_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("collusion.yml"),
        r#"apiVersion: v1
kind: AnomalyPattern
metadata:
  id: bid-rotation
  name: Bid rotation
spec:
  pattern_type: behavioral
  detection_method: CUSTOM_RULE
  indicators: [supplier_id, win_rate]
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("floor.yml"),
        r#"apiVersion: v1
kind: ThresholdRule
metadata:
  id: single-source-cap
  name: Single source cap
spec:
  field_name: single_source_ratio
  threshold_type: upper
  threshold_value: 0.4
  severity: high
"#,
    )
    .unwrap();

    let mut loader = RuleLoader::new(dir.path());
    loader.load_all().unwrap();

    let detector = AnomalyDetector::new(DetectionConfig::default()).unwrap();
    let summary = detector.load_rules(&loader).unwrap();
    assert_eq!(summary.patterns, 0);
    assert_eq!(summary.thresholds, 1);
    assert_eq!(summary.rejected, 1);
    assert!(detector.patterns().unwrap().iter().all(|p| p.pattern_id != "bid-rotation"));
}

// ============================================================================
// Full run
// ============================================================================

#[tokio::test]
async fn full_run_over_procurement_table() {
    let detector = AnomalyDetector::new(DetectionConfig::default()).unwrap();
    detector.load_rules(&loaded_examples()).unwrap();

    let report = detector.detect_json(procurement_table(), "PRJ-2024-031", None).await.unwrap();

    assert_eq!(report.project_id, "PRJ-2024-031");
    assert_eq!(report.detection_types, DetectionKind::ALL.to_vec());
    assert!(report.strategy_outcomes.iter().all(|o| o.succeeded()));
    assert_eq!(report.metrics.rows_analyzed, 30);

    // 120 days late is past the critical bound.
    assert!(report.metrics.critical_anomalies > 0);
    assert_eq!(report.overall_risk_level, RiskLevel::Extreme);
    assert!(report.anomalies.iter().any(|f| f.anomaly_type == AnomalyType::Temporal
        && f.affected_fields == ["delay_days"]
        && f.original_value == json!(120.0)));

    assert!(context_str(&report, "supplier_id").contains(&"S9"));
    assert!(context_str(&report, "pattern_id").contains(&"award-value-zscore"));

    assert!(report.anomalies.iter().any(|f| f.detection_method == DetectionMethod::Threshold
        && f.affected_fields == ["bid_count"]
        && f.original_value == json!(1.0)));
    assert!(report
        .anomalies
        .iter()
        .any(|f| f.anomaly_type == AnomalyType::Statistical && f.affected_fields == ["contract_amount"]));

    // Sorted by severity, most severe first.
    let ranks: Vec<u8> = report.anomalies.iter().map(|f| f.severity.rank()).collect();
    assert!(ranks.windows(2).all(|w| w[0] >= w[1]));

    let s9 = detector.get_profile("S9").unwrap().unwrap();
    assert!(s9.risk_score > 0.0);
    assert!(!s9.anomaly_history.is_empty());
    // Suppliers seen in the data get a profile even without findings.
    assert!(detector.get_profile("S0").unwrap().is_some());
}

#[tokio::test]
async fn report_serializes_to_json() {
    let detector = AnomalyDetector::new(DetectionConfig::default()).unwrap();
    let report = detector
        .detect_json(
            json!({"supplier_id": "S1", "bid_frequency": 25, "win_rate": 0.85}),
            "PRJ-7",
            Some(&[DetectionKind::Behavioral]),
        )
        .await
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["overall_risk_level"], "high risk");
    assert_eq!(value["metrics"]["high_anomalies"], 2);
    assert_eq!(value["detection_types"], json!(["behavioral"]));
    assert_eq!(value["anomalies"][0]["severity"], "high");
    assert_eq!(value["anomalies"][0]["detection_method"], "RULE_BASED");

    let back: AnomalyReport = serde_json::from_value(value).unwrap();
    assert_eq!(back.report_id, report.report_id);
    assert_eq!(back.anomalies.len(), 2);
    assert!(!back.from_cache);
}

#[tokio::test]
async fn concurrent_callers_share_one_detector() {
    let detector = Arc::new(AnomalyDetector::new(DetectionConfig::default()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move {
                let input = json!({"supplier_id": "S1", "bid_frequency": 21 + i, "win_rate": 0.5});
                let project_id = format!("PRJ-{}", i);
                let report = detector
                    .detect_json(input, &project_id, Some(&[DetectionKind::Behavioral]))
                    .await;
                report
            })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.anomalies.len(), 1);
    }

    let stats = detector.get_statistics().unwrap();
    assert_eq!(stats.total_runs, 4);
    assert_eq!(stats.history_len, 4);
    assert_eq!(detector.get_profile("S1").unwrap().unwrap().anomaly_history.len(), 4);
}
