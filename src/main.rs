//! parlay-bot: scores a prop slate and builds parlay recommendations.
//!
//! 1. Reads prop records (with the upstream scorers' recorded opinions)
//! 2. Aggregates each prop into a calibrated confidence
//! 3. Builds 2-5 leg parlays under uniqueness, diversity and correlation rules
//! 4. Optionally reports batch-level signal exposure

mod config;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use common::config::ConstructionMode;
use common::{Prop, RawPropRecord};
use parlay_strategy::{
    ConfidenceAggregator, ConfidenceEngine, ParlayCandidate, ParlayPlanner,
    PortfolioExposureReport, RecordedScorer, RecordedSignals, ScorerRegistry,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Standard,
    Optimizer,
}

impl From<ModeArg> for ConstructionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Standard => ConstructionMode::Standard,
            ModeArg::Optimizer => ConstructionMode::Optimizer,
        }
    }
}

/// Confidence-aggregating parlay builder
#[derive(Parser)]
#[command(name = "parlay-bot", about = "Build correlation-aware parlays from scored props")]
struct Cli {
    /// JSON array of prop records.
    #[arg(long)]
    input: PathBuf,

    /// Config file (defaults to ./config.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the construction mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Include the portfolio exposure report.
    #[arg(long)]
    exposure_report: bool,

    /// Write JSON here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    generated_at: String,
    mode: ConstructionMode,
    props_loaded: usize,
    props_skipped: usize,
    pool_size: usize,
    parlays: &'a BTreeMap<String, Vec<ParlayCandidate>>,
    shortfalls: &'a BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exposure: Option<PortfolioExposureReport>,
}

/// Validate records, keeping the recorded opinions keyed by prop identity.
fn load_props(records: Vec<RawPropRecord>) -> (Vec<Prop>, RecordedSignals, usize) {
    let mut props = Vec::with_capacity(records.len());
    let mut signals = RecordedSignals::new();
    let mut skipped = 0;

    for (i, record) in records.into_iter().enumerate() {
        match record.to_prop() {
            Ok(prop) => {
                signals
                    .entry(prop.key())
                    .or_default()
                    .extend(record.signals);
                props.push(prop);
            }
            Err(e) => {
                warn!("Skipping record {}: {}", i, e);
                skipped += 1;
            }
        }
    }

    (props, signals, skipped)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parlay_bot=info,parlay_strategy=info,common=info".into()
            }),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = config::load_config(cli.config.as_deref()).context("Configuration error")?;
    if let Some(mode) = cli.mode {
        cfg.construction.mode = mode.into();
    }
    info!(
        "Construction: mode={:?}, min_confidence={}, max_player_uses={}, max_player_exposure={:.2}",
        cfg.construction.mode,
        cfg.construction.min_confidence,
        cfg.construction.max_player_uses,
        cfg.construction.max_player_exposure,
    );

    let raw = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let records: Vec<RawPropRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", cli.input.display()))?;
    let (props, recorded, skipped) = load_props(records);
    info!("Loaded {} props ({} skipped)", props.len(), skipped);

    let mut registry: ScorerRegistry<RecordedSignals> = ScorerRegistry::new();
    for (name, weight) in &cfg.signal_weights {
        registry.register(Arc::new(RecordedScorer::new(name.clone())), *weight)?;
    }
    let engine = ConfidenceEngine::new(
        registry,
        ConfidenceAggregator::new(cfg.aggregation.clone()),
    );
    info!(
        "Registered {} scorers: {}",
        engine.registry().len(),
        engine.registry().names().join(", ")
    );
    let results = engine.score_pool(&props, &recorded);

    let mode = cfg.construction.mode;
    let planner = ParlayPlanner::new(cfg);
    let batch = planner.build_all(results)?;
    let exposure = cli
        .exposure_report
        .then(|| planner.analyze_exposure(&batch));
    if let Some(report) = &exposure {
        info!(
            "Exposure: risk={:?}, HHI={:.3}, over-exposed={}",
            report.risk,
            report.concentration,
            report.over_exposed_agents.len()
        );
    }

    let output = RunOutput {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        mode,
        props_loaded: props.len(),
        props_skipped: skipped,
        pool_size: batch.pool_size,
        parlays: &batch.buckets,
        shortfalls: &batch.shortfalls,
        exposure,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} parlays to {}", batch.total(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_props_skips_malformed() {
        let records: Vec<RawPropRecord> = serde_json::from_str(
            r#"[
                {"player": "Josh Allen", "team": "BUF", "opponent": "MIA", "position": "QB",
                 "stat_type": "Passing Yards", "line": 245.5, "direction": "OVER",
                 "signals": {"DVOA": {"score": 72.0}}},
                {"player": "Tyreek Hill", "team": "MIA", "opponent": "BUF", "position": "WR",
                 "stat_type": "Receiving Yards", "bet_type": "under"},
                {"player_name": "James Cook", "team": "BUF", "opponent": "MIA", "position": "rb",
                 "stat_type": "Rushing Yards", "line": 64.5, "bet_type": "under"}
            ]"#,
        )
        .unwrap();

        let (props, signals, skipped) = load_props(records);
        assert_eq!(props.len(), 2);
        assert_eq!(skipped, 1, "missing line");
        assert_eq!(signals[&props[0].key()]["DVOA"].score, 72.0);
        assert_eq!(props[1].position, "RB");
    }
}
