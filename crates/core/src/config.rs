use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

const ENV_PREFIX: &str = "TENDERSCOPE_";

fn env_opt(key: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .filter(|s| !s.is_empty())
}

/// Parse an env var, keeping the default when unset or unparseable.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env_opt(key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key = %format!("{}{}", ENV_PREFIX, key), value = %raw, "ignoring unparseable env value");
                default
            }
        },
        None => default,
    }
}

/// How the merged finding list is ordered before capping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityOrder {
    /// Critical, high, medium, low, info.
    #[default]
    Rank,
    /// Alphabetical by label: critical, high, info, low, medium. Kept for
    /// consumers that depend on the historical ordering.
    Legacy,
}

impl FromStr for SeverityOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rank" => Ok(SeverityOrder::Rank),
            "legacy" => Ok(SeverityOrder::Legacy),
            other => Err(format!("unknown severity order: '{}'", other)),
        }
    }
}

/// Tunable parameters for every detection strategy. Snapshotted per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    // ── Statistical ──────────────────────────────────────────
    #[serde(default = "default_z_score_threshold")]
    pub z_score_threshold: f64,
    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,

    // ── Outlier models ───────────────────────────────────────
    /// Expected outlier fraction, in (0, 0.5].
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Rows sampled per isolation tree (capped at the batch size).
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    /// Minimum batch size for the local-density model.
    #[serde(default = "default_lof_min_rows")]
    pub lof_min_rows: usize,
    #[serde(default = "default_lof_max_neighbors")]
    pub lof_max_neighbors: usize,

    // ── Behavioral / temporal ────────────────────────────────
    #[serde(default = "default_bid_frequency_threshold")]
    pub bid_frequency_threshold: f64,
    #[serde(default = "default_win_rate_threshold")]
    pub win_rate_threshold: f64,
    #[serde(default = "default_delay_days_threshold")]
    pub delay_days_threshold: f64,
    #[serde(default = "default_critical_delay_days")]
    pub critical_delay_days: f64,
    #[serde(default = "default_duration_deviation_threshold")]
    pub duration_deviation_threshold: f64,

    // ── Profiles ─────────────────────────────────────────────
    /// Weight of the newest run in the profile risk average.
    #[serde(default = "default_profile_smoothing")]
    pub profile_smoothing: f64,

    // ── Execution ────────────────────────────────────────────
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Per-strategy deadline.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_anomalies_per_check")]
    pub max_anomalies_per_check: usize,
    #[serde(default)]
    pub severity_order: SeverityOrder,

    // ── Cache / history ──────────────────────────────────────
    #[serde(default)]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_z_score_threshold() -> f64 { 3.0 }
fn default_iqr_multiplier() -> f64 { 1.5 }
fn default_contamination() -> f64 { 0.1 }
fn default_n_estimators() -> usize { 100 }
fn default_max_samples() -> usize { 256 }
fn default_random_state() -> u64 { 42 }
fn default_lof_min_rows() -> usize { 20 }
fn default_lof_max_neighbors() -> usize { 20 }
fn default_bid_frequency_threshold() -> f64 { 20.0 }
fn default_win_rate_threshold() -> f64 { 0.8 }
fn default_delay_days_threshold() -> f64 { 30.0 }
fn default_critical_delay_days() -> f64 { 90.0 }
fn default_duration_deviation_threshold() -> f64 { 0.5 }
fn default_profile_smoothing() -> f64 { 0.3 }
fn default_max_workers() -> usize { 4 }
fn default_timeout_seconds() -> u64 { 300 }
fn default_max_anomalies_per_check() -> usize { 100 }
fn default_cache_ttl_minutes() -> u64 { 60 }
fn default_cache_capacity() -> usize { 256 }
fn default_max_history() -> usize { 1000 }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: default_z_score_threshold(),
            iqr_multiplier: default_iqr_multiplier(),
            contamination: default_contamination(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
            random_state: default_random_state(),
            lof_min_rows: default_lof_min_rows(),
            lof_max_neighbors: default_lof_max_neighbors(),
            bid_frequency_threshold: default_bid_frequency_threshold(),
            win_rate_threshold: default_win_rate_threshold(),
            delay_days_threshold: default_delay_days_threshold(),
            critical_delay_days: default_critical_delay_days(),
            duration_deviation_threshold: default_duration_deviation_threshold(),
            profile_smoothing: default_profile_smoothing(),
            max_workers: default_max_workers(),
            timeout_seconds: default_timeout_seconds(),
            max_anomalies_per_check: default_max_anomalies_per_check(),
            severity_order: SeverityOrder::default(),
            cache_enabled: false,
            cache_ttl_minutes: default_cache_ttl_minutes(),
            cache_capacity: default_cache_capacity(),
            max_history: default_max_history(),
        }
    }
}

impl DetectionConfig {
    /// Build config from `TENDERSCOPE_*` environment variables (call
    /// `load_dotenv()` first). Unset keys keep their defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            z_score_threshold: env_parse("Z_SCORE_THRESHOLD", d.z_score_threshold),
            iqr_multiplier: env_parse("IQR_MULTIPLIER", d.iqr_multiplier),
            contamination: env_parse("CONTAMINATION", d.contamination),
            n_estimators: env_parse("N_ESTIMATORS", d.n_estimators),
            max_samples: env_parse("MAX_SAMPLES", d.max_samples),
            random_state: env_parse("RANDOM_STATE", d.random_state),
            lof_min_rows: env_parse("LOF_MIN_ROWS", d.lof_min_rows),
            lof_max_neighbors: env_parse("LOF_MAX_NEIGHBORS", d.lof_max_neighbors),
            bid_frequency_threshold: env_parse("BID_FREQUENCY_THRESHOLD", d.bid_frequency_threshold),
            win_rate_threshold: env_parse("WIN_RATE_THRESHOLD", d.win_rate_threshold),
            delay_days_threshold: env_parse("DELAY_DAYS_THRESHOLD", d.delay_days_threshold),
            critical_delay_days: env_parse("CRITICAL_DELAY_DAYS", d.critical_delay_days),
            duration_deviation_threshold: env_parse(
                "DURATION_DEVIATION_THRESHOLD",
                d.duration_deviation_threshold,
            ),
            profile_smoothing: env_parse("PROFILE_SMOOTHING", d.profile_smoothing),
            max_workers: env_parse("MAX_WORKERS", d.max_workers),
            timeout_seconds: env_parse("TIMEOUT_SECONDS", d.timeout_seconds),
            max_anomalies_per_check: env_parse("MAX_ANOMALIES_PER_CHECK", d.max_anomalies_per_check),
            severity_order: env_parse("SEVERITY_ORDER", d.severity_order),
            cache_enabled: env_parse("CACHE_ENABLED", d.cache_enabled),
            cache_ttl_minutes: env_parse("CACHE_TTL_MINUTES", d.cache_ttl_minutes),
            cache_capacity: env_parse("CACHE_CAPACITY", d.cache_capacity),
            max_history: env_parse("MAX_HISTORY", d.max_history),
        }
    }

    /// Reject parameter combinations no strategy can work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("z_score_threshold", self.z_score_threshold),
            ("iqr_multiplier", self.iqr_multiplier),
            ("bid_frequency_threshold", self.bid_frequency_threshold),
            ("win_rate_threshold", self.win_rate_threshold),
            ("delay_days_threshold", self.delay_days_threshold),
            ("duration_deviation_threshold", self.duration_deviation_threshold),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CoreError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(CoreError::Config(format!(
                "contamination must be within (0, 0.5], got {}",
                self.contamination
            )));
        }
        if !(0.0..=1.0).contains(&self.profile_smoothing) {
            return Err(CoreError::Config(format!(
                "profile_smoothing must be within [0, 1], got {}",
                self.profile_smoothing
            )));
        }
        if self.critical_delay_days < self.delay_days_threshold {
            return Err(CoreError::Config(
                "critical_delay_days must not be below delay_days_threshold".to_string(),
            ));
        }
        let non_zero = [
            ("n_estimators", self.n_estimators),
            ("max_samples", self.max_samples),
            ("lof_max_neighbors", self.lof_max_neighbors),
            ("max_workers", self.max_workers),
            ("max_anomalies_per_check", self.max_anomalies_per_check),
            ("cache_capacity", self.cache_capacity),
            ("max_history", self.max_history),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(CoreError::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.timeout_seconds == 0 {
            return Err(CoreError::Config("timeout_seconds must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Detection config:");
        tracing::info!(
            "  statistical: z>{} iqr_k={}",
            self.z_score_threshold,
            self.iqr_multiplier
        );
        tracing::info!(
            "  outlier:     contamination={} trees={} seed={}",
            self.contamination,
            self.n_estimators,
            self.random_state
        );
        tracing::info!(
            "  execution:   workers={} timeout={}s cap={} order={:?}",
            self.max_workers,
            self.timeout_seconds,
            self.max_anomalies_per_check,
            self.severity_order
        );
        tracing::info!(
            "  cache:       enabled={} ttl={}m history={}",
            self.cache_enabled,
            self.cache_ttl_minutes,
            self.max_history
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = DetectionConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.z_score_threshold, 3.0);
        assert_eq!(cfg.max_anomalies_per_check, 100);
        assert_eq!(cfg.severity_order, SeverityOrder::Rank);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: DetectionConfig =
            serde_json::from_str(r#"{"z_score_threshold": 2.5, "severity_order": "legacy"}"#).unwrap();
        assert_eq!(cfg.z_score_threshold, 2.5);
        assert_eq!(cfg.iqr_multiplier, 1.5);
        assert_eq!(cfg.severity_order, SeverityOrder::Legacy);
    }

    #[test]
    fn rejects_bad_contamination() {
        let cfg = DetectionConfig { contamination: 0.7, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_cap() {
        let cfg = DetectionConfig { max_anomalies_per_check: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("TENDERSCOPE_IQR_MULTIPLIER", "3.0");
        std::env::set_var("TENDERSCOPE_SEVERITY_ORDER", "legacy");
        let cfg = DetectionConfig::from_env();
        std::env::remove_var("TENDERSCOPE_IQR_MULTIPLIER");
        std::env::remove_var("TENDERSCOPE_SEVERITY_ORDER");
        assert_eq!(cfg.iqr_multiplier, 3.0);
        assert_eq!(cfg.severity_order, SeverityOrder::Legacy);
    }
}
