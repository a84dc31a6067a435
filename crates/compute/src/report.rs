//! Report assembly: metrics, overall risk and narrative summary.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenderscope_core::{AnomalyPattern, AnomalyResult, AnomalyType, DetectionConfig, Severity};
use uuid::Uuid;

use crate::strategies::DetectionKind;

/// Aggregate numbers over one run's final findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyMetrics {
    pub total_anomalies: usize,
    pub critical_anomalies: usize,
    pub high_anomalies: usize,
    pub medium_anomalies: usize,
    pub low_anomalies: usize,
    pub info_anomalies: usize,
    /// Count per anomaly type label.
    pub by_type: BTreeMap<String, usize>,
    /// Count per detection method.
    pub by_method: BTreeMap<String, usize>,
    pub average_confidence: f64,
    pub average_anomaly_score: f64,
    pub detection_duration_ms: u64,
    pub rows_analyzed: usize,
    pub fields_analyzed: usize,
}

impl AnomalyMetrics {
    pub fn from_findings(findings: &[AnomalyResult], elapsed: Duration, rows: usize, fields: usize) -> Self {
        let mut m = Self {
            total_anomalies: findings.len(),
            detection_duration_ms: elapsed.as_millis() as u64,
            rows_analyzed: rows,
            fields_analyzed: fields,
            ..Self::default()
        };

        for f in findings {
            match f.severity {
                Severity::Critical => m.critical_anomalies += 1,
                Severity::High => m.high_anomalies += 1,
                Severity::Medium => m.medium_anomalies += 1,
                Severity::Low => m.low_anomalies += 1,
                Severity::Info => m.info_anomalies += 1,
            }
            *m.by_type.entry(f.anomaly_type.label().to_string()).or_default() += 1;
            *m.by_method.entry(f.detection_method.to_string()).or_default() += 1;
        }

        if !findings.is_empty() {
            let n = findings.len() as f64;
            m.average_confidence = findings.iter().map(|f| f.confidence_score).sum::<f64>() / n;
            m.average_anomaly_score = findings.iter().map(|f| f.anomaly_score).sum::<f64>() / n;
        }
        m
    }

    /// The most frequent anomaly type, ties broken by label order.
    pub fn dominant_type(&self) -> Option<(&str, usize)> {
        self.by_type
            .iter()
            .fold(None, |best: Option<(&str, usize)>, (label, &count)| match best {
                Some((_, c)) if c >= count => best,
                _ => Some((label.as_str(), count)),
            })
    }
}

/// Overall risk classification of a run, driven by the most severe finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "extreme risk")]
    Extreme,
    #[serde(rename = "high risk")]
    High,
    #[serde(rename = "moderate risk")]
    Moderate,
    #[serde(rename = "low risk")]
    Low,
    #[serde(rename = "normal")]
    Normal,
}

impl RiskLevel {
    pub fn from_metrics(m: &AnomalyMetrics) -> Self {
        if m.critical_anomalies > 0 {
            RiskLevel::Extreme
        } else if m.high_anomalies > 0 {
            RiskLevel::High
        } else if m.medium_anomalies > 0 {
            RiskLevel::Moderate
        } else if m.low_anomalies > 0 {
            RiskLevel::Low
        } else {
            RiskLevel::Normal
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Extreme => "extreme risk",
            RiskLevel::High => "high risk",
            RiskLevel::Moderate => "moderate risk",
            RiskLevel::Low => "low risk",
            RiskLevel::Normal => "normal",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How one requested strategy fared in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub strategy: DetectionKind,
    /// Findings contributed before merging.
    pub findings: usize,
    /// Contained failure, if the strategy did not complete.
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl StrategyOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// The aggregated output of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub report_id: String,
    pub project_id: String,
    pub generated_at: DateTime<Utc>,
    pub detection_types: Vec<DetectionKind>,
    pub anomalies: Vec<AnomalyResult>,
    pub metrics: AnomalyMetrics,
    pub overall_risk_level: RiskLevel,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    /// Patterns registered when the run started.
    pub patterns_used: Vec<AnomalyPattern>,
    /// Config the run used.
    pub config: DetectionConfig,
    pub strategy_outcomes: Vec<StrategyOutcome>,
    /// Served from the result cache rather than computed.
    #[serde(default)]
    pub from_cache: bool,
}

/// Inputs to [`build_report`] besides the findings.
pub struct ReportContext<'a> {
    pub project_id: &'a str,
    pub detection_types: &'a [DetectionKind],
    pub patterns: &'a [AnomalyPattern],
    pub config: &'a DetectionConfig,
    pub rows: usize,
    pub fields: usize,
    pub elapsed: Duration,
}

pub fn build_report(
    anomalies: Vec<AnomalyResult>,
    outcomes: Vec<StrategyOutcome>,
    ctx: ReportContext<'_>,
) -> AnomalyReport {
    let metrics = AnomalyMetrics::from_findings(&anomalies, ctx.elapsed, ctx.rows, ctx.fields);
    let overall_risk_level = RiskLevel::from_metrics(&metrics);

    AnomalyReport {
        report_id: Uuid::new_v4().to_string(),
        project_id: ctx.project_id.to_string(),
        generated_at: Utc::now(),
        detection_types: ctx.detection_types.to_vec(),
        key_findings: key_findings(&metrics, &anomalies),
        recommendations: recommendations(&metrics),
        anomalies,
        metrics,
        overall_risk_level,
        patterns_used: ctx.patterns.to_vec(),
        config: ctx.config.clone(),
        strategy_outcomes: outcomes,
        from_cache: false,
    }
}

fn key_findings(m: &AnomalyMetrics, anomalies: &[AnomalyResult]) -> Vec<String> {
    if m.total_anomalies == 0 {
        return vec![format!("No anomalies detected across {} analyzed rows", m.rows_analyzed)];
    }

    let mut out = vec![format!(
        "Detected {} anomalies: {} critical, {} high, {} medium, {} low",
        m.total_anomalies, m.critical_anomalies, m.high_anomalies, m.medium_anomalies, m.low_anomalies
    )];

    if let Some((label, count)) = m.dominant_type() {
        out.push(format!("Most findings are {} anomalies ({} of {})", label, count, m.total_anomalies));
    }

    if m.critical_anomalies > 0 {
        let titles: Vec<&str> = anomalies
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .map(|f| f.title.as_str())
            .take(3)
            .collect();
        out.push(format!("Critical: {}", titles.join("; ")));
    }

    out.push(match m.average_confidence {
        c if c >= 0.8 => format!("Findings are high-confidence (average {:.2})", c),
        c if c >= 0.6 => format!("Findings are moderately confident (average {:.2})", c),
        c => format!("Findings are low-confidence (average {:.2}); expect false positives", c),
    });

    out
}

fn recommendations(m: &AnomalyMetrics) -> Vec<String> {
    if m.total_anomalies == 0 {
        return vec!["Continue routine monitoring".to_string()];
    }

    let mut out = Vec::new();
    if m.critical_anomalies > 0 {
        out.push("Open an investigation into the critical findings immediately".to_string());
    }
    if m.high_anomalies > 0 {
        out.push("Review the high-severity findings with the responsible department".to_string());
    }

    let has = |t: AnomalyType| m.by_type.contains_key(t.label());
    if has(AnomalyType::Behavioral) {
        out.push("Audit supplier bidding history and relationships between bidders".to_string());
    }
    if has(AnomalyType::Temporal) {
        out.push("Check project schedules and the justification for delays".to_string());
    }
    if has(AnomalyType::Financial) || has(AnomalyType::Pricing) {
        out.push("Verify budget changes and quoted prices against approvals".to_string());
    }
    if has(AnomalyType::Threshold) {
        out.push("Confirm threshold breaches against procurement regulations".to_string());
    }
    if has(AnomalyType::Statistical) || has(AnomalyType::Outlier) {
        out.push("Inspect the outlying records for data-entry errors before escalating".to_string());
    }
    if m.average_confidence < 0.6 {
        out.push("Manually verify findings before acting on them".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use tenderscope_core::DetectionMethod;

    use super::*;

    fn finding(t: AnomalyType, s: Severity, c: f64) -> AnomalyResult {
        AnomalyResult::new(t, DetectionMethod::RuleBased, s).with_scores(c, 2.0)
    }

    fn report(findings: Vec<AnomalyResult>) -> AnomalyReport {
        let config = DetectionConfig::default();
        build_report(
            findings,
            Vec::new(),
            ReportContext {
                project_id: "P-1",
                detection_types: &DetectionKind::ALL,
                patterns: &[],
                config: &config,
                rows: 3,
                fields: 2,
                elapsed: Duration::from_millis(12),
            },
        )
    }

    #[test]
    fn critical_means_extreme_risk() {
        let r = report(vec![
            finding(AnomalyType::Temporal, Severity::Critical, 0.95),
            finding(AnomalyType::Behavioral, Severity::High, 0.85),
        ]);
        assert!(r.metrics.critical_anomalies > 0);
        assert_eq!(r.overall_risk_level, RiskLevel::Extreme);
        assert_eq!(r.metrics.by_type["temporal"], 1);
        assert_eq!(r.metrics.by_method["RULE_BASED"], 2);
        assert!((r.metrics.average_confidence - 0.9).abs() < 1e-12);
        assert_eq!(r.metrics.detection_duration_ms, 12);
        assert!(r.recommendations.iter().any(|s| s.contains("critical")));
    }

    #[test]
    fn empty_run_is_normal() {
        let r = report(Vec::new());
        assert_eq!(r.overall_risk_level, RiskLevel::Normal);
        assert_eq!(r.metrics.total_anomalies, 0);
        assert_eq!(r.metrics.average_confidence, 0.0);
        assert_eq!(r.recommendations, vec!["Continue routine monitoring"]);
    }

    #[test]
    fn risk_bands() {
        let level = |s| report(vec![finding(AnomalyType::Threshold, s, 0.9)]).overall_risk_level;
        assert_eq!(level(Severity::High), RiskLevel::High);
        assert_eq!(level(Severity::Medium), RiskLevel::Moderate);
        assert_eq!(level(Severity::Low), RiskLevel::Low);
        assert_eq!(level(Severity::Info), RiskLevel::Normal);
    }

    #[test]
    fn risk_level_serializes_as_label() {
        assert_eq!(serde_json::to_string(&RiskLevel::Extreme).unwrap(), "\"extreme risk\"");
    }

    #[test]
    fn low_confidence_gets_manual_verification() {
        let r = report(vec![finding(AnomalyType::Statistical, Severity::Low, 0.3)]);
        assert!(r.recommendations.iter().any(|s| s.contains("Manually verify")));
        assert!(r.key_findings.iter().any(|s| s.contains("low-confidence")));
    }
}
