//! Configuration loader: .env, config.toml, then environment overrides.

use common::config::ConstructionMode;
use common::{EngineConfig, Error};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn parse_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn parse_fraction(raw: &str, env_name: &str) -> Result<f64, Error> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number in (0,1]")))?;
    if !(parsed > 0.0 && parsed <= 1.0) {
        return Err(Error::Config(format!("{env_name} must be a number in (0,1]")));
    }
    Ok(parsed)
}

pub fn parse_mode(raw: &str) -> Result<ConstructionMode, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "standard" => Ok(ConstructionMode::Standard),
        "optimizer" | "optimized" => Ok(ConstructionMode::Optimizer),
        _ => Err(Error::Config(
            "PARLAY_MODE must be one of: standard, optimizer".into(),
        )),
    }
}

fn in_unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    for (name, weight) in &config.signal_weights {
        if !weight.is_finite() || *weight < 0.0 {
            issues.push(format!("signal_weights.{name} must be >= 0"));
        }
    }

    let agg = &config.aggregation;
    if agg.neutral_band < 0.0 {
        issues.push("aggregation.neutral_band must be >= 0".into());
    }
    if !in_unit_range(agg.neutral_weight_factor) {
        issues.push("aggregation.neutral_weight_factor must be in [0,1]".into());
    }
    if !in_unit_range(agg.agreement_low) || !in_unit_range(agg.agreement_high) {
        issues.push("aggregation agreement thresholds must be in [0,1]".into());
    }
    if agg.agreement_low >= agg.agreement_high {
        issues.push("aggregation.agreement_low must be < aggregation.agreement_high".into());
    }
    if agg.bias_divisor <= 0.0 {
        issues.push("aggregation.bias_divisor must be > 0".into());
    }

    let construction = &config.construction;
    if construction.min_confidence > 100 {
        issues.push("construction.min_confidence must be <= 100".into());
    }
    if construction.max_player_uses == 0 {
        issues.push("construction.max_player_uses must be > 0".into());
    }
    if !(construction.max_player_exposure > 0.0 && construction.max_player_exposure <= 1.0) {
        issues.push("construction.max_player_exposure must be in (0,1]".into());
    }
    if construction.max_per_position == 0 {
        issues.push("construction.max_per_position must be > 0".into());
    }

    let optimizer = &config.optimizer;
    if optimizer.max_attempts == 0 {
        issues.push("optimizer.max_attempts must be > 0".into());
    }
    if optimizer.relaxation_points < 0.0 {
        issues.push("optimizer.relaxation_points must be >= 0".into());
    }
    if optimizer.confidence_weight < 0.0 || optimizer.independence_weight < 0.0 {
        issues.push("optimizer weights must be >= 0".into());
    }

    let correlation = &config.correlation;
    if correlation.base_penalty < 0.0 {
        issues.push("correlation.base_penalty must be >= 0".into());
    }
    if correlation.penalty_floor > 0.0 {
        issues.push("correlation.penalty_floor must be <= 0".into());
    }
    if correlation.drivers_per_leg == 0 {
        issues.push("correlation.drivers_per_leg must be > 0".into());
    }
    for pair in &correlation.strength_matrix {
        if !(0.5..=1.5).contains(&pair.strength) {
            issues.push(format!(
                "correlation.strength_matrix {}/{} must be in [0.5,1.5]",
                pair.a, pair.b
            ));
        }
    }

    let exposure = &config.exposure;
    for (name, value) in [
        ("materiality", exposure.materiality),
        ("cap", exposure.cap),
        ("target", exposure.target),
        ("under_utilized", exposure.under_utilized),
        ("critical_exposure", exposure.critical_exposure),
        ("high_exposure", exposure.high_exposure),
        ("watch_exposure", exposure.watch_exposure),
    ] {
        if !in_unit_range(value) {
            issues.push(format!("exposure.{name} must be in [0,1]"));
        }
    }
    if exposure.target > exposure.cap {
        issues.push("exposure.target must be <= exposure.cap".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load engine configuration.
///
/// `path` falls back to `config.toml` when that file exists; otherwise the
/// defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, Error> {
    // 1. Load .env file.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, 3. overlay the config file.
    let mut config = EngineConfig::default();
    let config_path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
    if path.is_some() || config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 4. Environment overrides.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut EngineConfig, var: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var("PARLAY_MIN_CONFIDENCE") {
        let parsed = parse_u32(&raw, "PARLAY_MIN_CONFIDENCE")?;
        if parsed > 100 {
            return Err(Error::Config(
                "PARLAY_MIN_CONFIDENCE must be an integer in [0,100]".into(),
            ));
        }
        config.construction.min_confidence = parsed as u8;
    }
    if let Some(raw) = var("PARLAY_MAX_PLAYER_USES") {
        config.construction.max_player_uses = parse_u32(&raw, "PARLAY_MAX_PLAYER_USES")?;
    }
    if let Some(raw) = var("PARLAY_MAX_PLAYER_EXPOSURE") {
        config.construction.max_player_exposure =
            parse_fraction(&raw, "PARLAY_MAX_PLAYER_EXPOSURE")?;
    }
    if let Some(raw) = var("PARLAY_MODE") {
        config.construction.mode = parse_mode(&raw)?;
    }
    Ok(())
}
