use std::collections::BTreeMap;

use tenderscope_core::dataset::record;
use tenderscope_core::{AnomalyType, DetectionInput, FieldValue, Record};
use tenderscope_rules::default_patterns;

use super::*;

fn dataset(rows: Vec<Record>) -> Dataset {
    Dataset::preprocess(DetectionInput::Table(rows)).unwrap()
}

fn ctx(rows: Vec<Record>) -> StrategyContext {
    StrategyContext::new(dataset(rows)).with_patterns(default_patterns())
}

fn pattern(id: &str, method: DetectionMethod, indicators: &[&str]) -> AnomalyPattern {
    AnomalyPattern {
        pattern_id: id.to_string(),
        pattern_name: id.to_string(),
        pattern_type: AnomalyType::Pricing,
        description: String::new(),
        indicators: indicators.iter().map(|s| s.to_string()).collect(),
        threshold_config: BTreeMap::new(),
        detection_method: method,
        severity_mapping: BTreeMap::new(),
        confidence_threshold: 0.0,
        enabled: true,
    }
}

#[test]
fn budget_spike_bands() {
    let findings = PatternStrategy
        .detect(&ctx(vec![
            record([("budget_change_rate", 60.0), ("budget_amount", 1_000.0)]),
            record([("budget_change_rate", -150.0), ("budget_amount", 2_000.0)]),
            record([("budget_change_rate", 10.0), ("budget_amount", 3_000.0)]),
        ]))
        .unwrap();
    let spikes: Vec<_> = findings
        .iter()
        .filter(|f| f.detection_method == DetectionMethod::CustomRule)
        .collect();
    assert_eq!(spikes.len(), 2);
    assert_eq!(spikes[0].severity, Severity::Medium);
    assert_eq!(spikes[1].severity, Severity::High);
    assert_eq!(spikes[0].confidence_score, 0.9);
    assert_eq!(spikes[0].anomaly_type, AnomalyType::Financial);
    assert_eq!(spikes[0].context_data["pattern_id"], "budget_spike");
}

#[test]
fn timeline_deviation_late_and_early() {
    let findings = PatternStrategy
        .detect(&ctx(vec![
            record([("delay_days", 45.0), ("actual_duration", 200.0)]),
            record([("delay_days", 75.0), ("actual_duration", 230.0)]),
            record([("delay_days", -40.0), ("actual_duration", 100.0)]),
            record([("delay_days", 5.0), ("actual_duration", 150.0)]),
        ]))
        .unwrap();
    let timeline: Vec<_> = findings
        .iter()
        .filter(|f| f.context_data.get("pattern_id").map(|v| v == "timeline_deviation").unwrap_or(false))
        .collect();
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0].severity, Severity::High);
    assert_eq!(timeline[1].severity, Severity::Critical);
    assert_eq!(timeline[2].severity, Severity::Medium);
    assert_eq!(timeline[2].title, "Abnormally early completion");
    assert_eq!(timeline[2].confidence_score, 0.8);
}

#[test]
fn supplier_behavior_requires_both_signals() {
    let findings = PatternStrategy
        .detect(&ctx(vec![
            record([
                ("supplier_id", FieldValue::from("S9")),
                ("bid_frequency", FieldValue::from(30.0)),
                ("win_rate", FieldValue::from(0.9)),
            ]),
            record([
                ("supplier_id", FieldValue::from("S10")),
                ("bid_frequency", FieldValue::from(30.0)),
                ("win_rate", FieldValue::from(0.2)),
            ]),
        ]))
        .unwrap();
    let concentrated: Vec<_> = findings
        .iter()
        .filter(|f| f.title == "Concentrated winning pattern")
        .collect();
    assert_eq!(concentrated.len(), 1);
    assert!(concentrated[0].references_entity("S9"));
    assert_eq!(concentrated[0].affected_fields, vec!["win_rate"]);
    assert_eq!(concentrated[0].anomaly_type, AnomalyType::Behavioral);
}

#[test]
fn pattern_needs_half_of_its_indicators() {
    // price_anomaly declares three indicators; one present is not enough.
    let rows: Vec<Record> = (0..10)
        .map(|i| record([("unit_price", if i == 9 { 1_000.0 } else { 10.0 + i as f64 })]))
        .collect();
    let findings = PatternStrategy.detect(&ctx(rows)).unwrap();
    assert!(findings.is_empty());
}

#[test]
fn scoped_z_score_uses_pattern_threshold_and_type() {
    let mut p = pattern("award-z", DetectionMethod::ZScore, &["award_amount"]);
    p.threshold_config.insert("z_threshold".to_string(), 2.0);
    let mut rows: Vec<Record> = (0..20).map(|_| record([("award_amount", 100.0)])).collect();
    rows.push(record([("award_amount", 400.0)]));
    let findings = evaluate_pattern(&p, &dataset(rows), &RuleHandlerRegistry::with_defaults()).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].anomaly_type, AnomalyType::Pricing);
    assert_eq!(findings[0].severity, Severity::Medium);
    assert_eq!(findings[0].title, "award-z");
}

#[test]
fn confidence_threshold_drops_weak_findings() {
    let mut p = pattern("iqr", DetectionMethod::Iqr, &["unit_price"]);
    p.confidence_threshold = 0.85;
    let rows: Vec<Record> = (0..10)
        .map(|i| record([("unit_price", if i == 9 { 1_000.0 } else { 10.0 + i as f64 })]))
        .collect();
    let ds = dataset(rows);
    let handlers = RuleHandlerRegistry::with_defaults();
    assert!(evaluate_pattern(&p, &ds, &handlers).unwrap().is_empty());
    p.confidence_threshold = 0.5;
    assert_eq!(evaluate_pattern(&p, &ds, &handlers).unwrap().len(), 1);
}

#[test]
fn unknown_handler_and_unsupported_method_are_rejected() {
    let handlers = RuleHandlerRegistry::with_defaults();
    let custom = pattern("nobody-handles-this", DetectionMethod::CustomRule, &["x"]);
    assert!(matches!(
        ensure_evaluable(&custom, &handlers),
        Err(DetectError::UnknownRuleHandler(_))
    ));
    let forest = pattern("forest", DetectionMethod::IsolationForest, &["x"]);
    assert!(matches!(
        ensure_evaluable(&forest, &handlers),
        Err(DetectError::UnsupportedPatternMethod { .. })
    ));
}

#[test]
fn failing_pattern_does_not_stop_the_others() {
    let mut handlers = RuleHandlerRegistry::with_defaults();
    handlers.register("exploding", |_: &AnomalyPattern, _: &Dataset| -> Result<Vec<AnomalyResult>> {
        panic!("handler bug")
    });
    handlers.register("erroring", |_: &AnomalyPattern, _: &Dataset| -> Result<Vec<AnomalyResult>> {
        Err(DetectError::StrategyFailed("bad data".into()))
    });
    let mut patterns = vec![
        pattern("exploding", DetectionMethod::CustomRule, &["delay_days"]),
        pattern("erroring", DetectionMethod::CustomRule, &["delay_days"]),
    ];
    patterns.extend(default_patterns());

    let mut ctx = StrategyContext::new(dataset(vec![record([("delay_days", 45.0)])])).with_patterns(patterns);
    ctx.handlers = Arc::new(handlers);

    let findings = PatternStrategy.detect(&ctx).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].context_data["pattern_id"], "timeline_deviation");
}

#[test]
fn disabled_patterns_are_skipped() {
    let mut patterns = default_patterns();
    for p in &mut patterns {
        p.enabled = false;
    }
    let ctx = StrategyContext::new(dataset(vec![record([("delay_days", 95.0)])])).with_patterns(patterns);
    assert!(PatternStrategy.detect(&ctx).unwrap().is_empty());
}
