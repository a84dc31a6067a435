//! tender-detect: run the anomaly detector over a JSON record or table.
//!
//! Reads one JSON object (a single record) or an array of objects (a table)
//! from `--input` or stdin and prints the anomaly report as JSON on stdout.
//! Logs go to stderr.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use tenderscope_compute::{AnomalyDetector, DetectionKind};
use tenderscope_core::{load_dotenv, DetectionConfig};
use tenderscope_rules::RuleLoader;

// ── CLI ─────────────────────────────────────────────────────────────

/// Multi-method anomaly detection for procurement records.
#[derive(Parser, Debug)]
#[command(name = "tender-detect", version, about)]
struct Cli {
    /// JSON file to analyze. Reads stdin when omitted.
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Project the records belong to.
    #[arg(long, env = "TENDERSCOPE_PROJECT_ID", default_value = "adhoc")]
    project_id: String,

    /// Comma-separated strategies to run (statistical, behavioral, temporal,
    /// pattern, outlier, threshold). All of them when omitted.
    #[arg(long, value_delimiter = ',')]
    types: Vec<DetectionKind>,

    /// Directory of YAML pattern/threshold rules to register on top of the defaults.
    #[arg(long, env = "TENDERSCOPE_RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// YAML detection config. Falls back to `TENDERSCOPE_*` environment variables.
    #[arg(long, env = "TENDERSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DetectionConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_yaml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(DetectionConfig::from_env()),
    }
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<serde_json::Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading input {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("input is not valid JSON")
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    config.log_summary();
    let detector = AnomalyDetector::new(config).context("invalid detection config")?;

    if let Some(dir) = &cli.rules_dir {
        let mut loader = RuleLoader::new(dir);
        loader
            .load_all()
            .with_context(|| format!("loading rules from {}", dir.display()))?;
        let summary = detector.load_rules(&loader)?;
        info!(
            patterns = summary.patterns,
            thresholds = summary.thresholds,
            rejected = summary.rejected,
            "custom rules registered"
        );
    }

    let input = read_input(cli.input.as_ref())?;
    let types = (!cli.types.is_empty()).then_some(cli.types.as_slice());
    let report = detector
        .detect_json(input, &cli.project_id, types)
        .await
        .context("detection failed")?;

    let out = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", out);
    Ok(())
}
