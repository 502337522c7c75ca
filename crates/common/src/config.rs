//! Engine configuration types.
//!
//! Everything the core treats as policy lives here as data so it can be
//! swapped through `config.toml` without recompiling.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Weight per registered signal scorer.
    #[serde(default = "default_signal_weights")]
    pub signal_weights: BTreeMap<String, f64>,

    /// Confidence aggregation parameters.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Parlay construction parameters.
    #[serde(default)]
    pub construction: ConstructionConfig,

    /// Optimizer-mode parameters.
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Correlation penalty model.
    #[serde(default)]
    pub correlation: CorrelationConfig,

    /// Batch exposure thresholds.
    #[serde(default)]
    pub exposure: ExposureConfig,
}

/// Values keyed by parlay size (2-5 legs).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerSize<T> {
    pub legs_2: T,
    pub legs_3: T,
    pub legs_4: T,
    pub legs_5: T,
}

impl<T: Copy> PerSize<T> {
    pub fn get(&self, size: usize) -> Option<T> {
        match size {
            2 => Some(self.legs_2),
            3 => Some(self.legs_3),
            4 => Some(self.legs_4),
            5 => Some(self.legs_5),
            _ => None,
        }
    }

    /// `(size, value)` pairs in ascending size order.
    pub fn entries(&self) -> [(usize, T); 4] {
        [
            (2, self.legs_2),
            (3, self.legs_3),
            (4, self.legs_4),
            (5, self.legs_5),
        ]
    }
}

/// Confidence aggregation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Signals read in reverse (`100 - score`) before use.
    #[serde(default = "default_anti_predictive")]
    pub anti_predictive_signals: BTreeSet<String>,

    /// Scores within this distance of 50 count as "no opinion".
    #[serde(default = "default_neutral_band")]
    pub neutral_band: f64,

    /// Multiplier applied to the weight of a no-opinion signal.
    #[serde(default = "default_neutral_weight_factor")]
    pub neutral_weight_factor: f64,

    /// Agreement fraction at or above which the penalty applies.
    #[serde(default = "default_agreement_high")]
    pub agreement_high: f64,

    /// Points subtracted when signals (nearly) all agree.
    #[serde(default = "default_agreement_penalty")]
    pub agreement_penalty: f64,

    /// Agreement fraction at or below which the bonus applies.
    #[serde(default = "default_agreement_low")]
    pub agreement_low: f64,

    /// Points added when signals are split.
    #[serde(default = "default_agreement_bonus")]
    pub agreement_bonus: f64,

    /// Bias corrections are divided by this before being applied.
    #[serde(default = "default_bias_divisor")]
    pub bias_divisor: f64,

    /// Signed per-stat-type bias constants.
    #[serde(default = "default_bias_corrections")]
    pub bias_corrections: BTreeMap<String, f64>,

    /// Additive per-stat-type reliability bonus or penalty.
    #[serde(default = "default_reliability_adjustments")]
    pub reliability_adjustments: BTreeMap<String, f64>,

    /// Fail aggregation for stat types absent from both tables.
    #[serde(default)]
    pub strict_stat_types: bool,
}

/// Which constructor variant to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionMode {
    Standard,
    Optimizer,
}

/// Parlay construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionConfig {
    #[serde(default = "default_mode")]
    pub mode: ConstructionMode,

    /// Props below this confidence never enter the pool.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,

    /// Parlays requested per leg-size bucket.
    #[serde(default = "default_targets")]
    pub targets: PerSize<usize>,

    /// Hard cap on parlays a single player may appear in.
    #[serde(default = "default_max_player_uses")]
    pub max_player_uses: u32,

    /// Max share of the whole batch one player may appear in.
    #[serde(default = "default_max_player_exposure")]
    pub max_player_exposure: f64,

    /// Max legs sharing one position inside a parlay.
    #[serde(default = "default_max_per_position")]
    pub max_per_position: usize,

    /// Let the same direction-qualified prop appear in several parlays,
    /// still bounded by `max_player_uses`.
    #[serde(default)]
    pub allow_prop_reuse: bool,

    /// Keep only the stronger side when both directions of a prop are pooled.
    #[serde(default = "default_true")]
    pub collapse_opposite_sides: bool,

    /// Bonus for a two-leg same-game parlay.
    #[serde(default = "default_same_game_bonus")]
    pub same_game_bonus: i32,

    /// Bonus when every leg comes from a different game.
    #[serde(default = "default_diversification_bonus")]
    pub diversification_bonus: i32,
}

/// Optimizer ("one player, one parlay") parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Starting confidence threshold per size.
    #[serde(default = "default_start_thresholds")]
    pub start_thresholds: PerSize<f64>,

    /// Total points the threshold may relax over all attempts.
    #[serde(default = "default_relaxation_points")]
    pub relaxation_points: f64,

    /// Construction attempts per target parlay.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_confidence_weight")]
    pub confidence_weight: f64,

    #[serde(default = "default_independence_weight")]
    pub independence_weight: f64,

    /// Two legs whose shared drivers reach this strength are never paired.
    #[serde(default = "default_max_pair_strength")]
    pub max_pair_strength: f64,
}

/// Symmetric strength entry of the correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPairStrength {
    pub a: String,
    pub b: String,
    pub strength: f64,
}

/// Correlation penalty model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Penalty per correlated leg pair before scaling by strength.
    #[serde(default = "default_base_penalty")]
    pub base_penalty: f64,

    /// Floor for the summed penalty of one parlay.
    #[serde(default = "default_penalty_floor")]
    pub penalty_floor: f64,

    /// Driving signals considered per leg.
    #[serde(default = "default_drivers_per_leg")]
    pub drivers_per_leg: usize,

    #[serde(default = "default_strong_threshold")]
    pub strong_threshold: f64,

    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,

    #[serde(default = "default_strength_matrix")]
    pub strength_matrix: Vec<SignalPairStrength>,
}

/// Batch-level signal exposure thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Minimum contribution for a top driver to count as driving a parlay.
    #[serde(default = "default_materiality")]
    pub materiality: f64,

    #[serde(default = "default_drivers_per_leg")]
    pub drivers_per_leg: usize,

    /// Exposure above which a signal is over-exposed.
    #[serde(default = "default_exposure_cap")]
    pub cap: f64,

    /// Exposure an over-exposed signal should be reduced to.
    #[serde(default = "default_exposure_target")]
    pub target: f64,

    /// Exposure at or below which a signal is under-utilized.
    #[serde(default = "default_under_utilized")]
    pub under_utilized: f64,

    #[serde(default = "default_critical_exposure")]
    pub critical_exposure: f64,

    #[serde(default = "default_high_exposure")]
    pub high_exposure: f64,

    /// Exposure level feeding the ELEVATED and MODERATE classes.
    #[serde(default = "default_watch_exposure")]
    pub watch_exposure: f64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_signal_weights() -> BTreeMap<String, f64> {
    [
        ("DVOA", 1.5),
        ("Matchup", 1.2),
        ("Volume", 1.0),
        ("Injury", 1.0),
        ("GameScript", 0.9),
        ("Trend", 0.8),
        ("LineValue", 0.7),
        ("Weather", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_anti_predictive() -> BTreeSet<String> {
    ["Trend".to_string()].into_iter().collect()
}
fn default_neutral_band() -> f64 {
    5.0
}
fn default_neutral_weight_factor() -> f64 {
    0.2
}
fn default_agreement_high() -> f64 {
    0.8
}
fn default_agreement_penalty() -> f64 {
    6.0
}
fn default_agreement_low() -> f64 {
    0.5
}
fn default_agreement_bonus() -> f64 {
    5.0
}
fn default_bias_divisor() -> f64 {
    3.0
}

fn default_bias_corrections() -> BTreeMap<String, f64> {
    [
        ("Passing Yards", -6.0),
        ("Passing TDs", -9.0),
        ("Rushing Yards", 3.0),
        ("Receiving Yards", -3.0),
        ("Receptions", 4.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_reliability_adjustments() -> BTreeMap<String, f64> {
    [
        ("Passing Yards", 1.0),
        ("Passing TDs", -2.0),
        ("Rushing Yards", 0.0),
        ("Receiving Yards", -1.0),
        ("Receptions", 2.0),
        ("Anytime TD", -3.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_mode() -> ConstructionMode {
    ConstructionMode::Standard
}
fn default_min_confidence() -> u8 {
    60
}
fn default_targets() -> PerSize<usize> {
    PerSize {
        legs_2: 5,
        legs_3: 3,
        legs_4: 2,
        legs_5: 1,
    }
}
fn default_max_player_uses() -> u32 {
    2
}
fn default_max_player_exposure() -> f64 {
    0.35
}
fn default_max_per_position() -> usize {
    2
}
fn default_same_game_bonus() -> i32 {
    3
}
fn default_diversification_bonus() -> i32 {
    2
}

fn default_start_thresholds() -> PerSize<f64> {
    PerSize {
        legs_2: 68.0,
        legs_3: 66.0,
        legs_4: 64.0,
        legs_5: 62.0,
    }
}
fn default_relaxation_points() -> f64 {
    15.0
}
fn default_max_attempts() -> u32 {
    30
}
fn default_confidence_weight() -> f64 {
    0.8
}
fn default_independence_weight() -> f64 {
    0.2
}
fn default_max_pair_strength() -> f64 {
    1.2
}

fn default_base_penalty() -> f64 {
    5.0
}
fn default_penalty_floor() -> f64 {
    -20.0
}
fn default_drivers_per_leg() -> usize {
    2
}
fn default_strong_threshold() -> f64 {
    1.2
}
fn default_moderate_threshold() -> f64 {
    0.9
}

fn default_strength_matrix() -> Vec<SignalPairStrength> {
    [
        ("DVOA", "Matchup", 1.5),
        ("Volume", "GameScript", 1.3),
        ("DVOA", "GameScript", 1.2),
        ("Injury", "Volume", 1.2),
        ("Trend", "Volume", 1.1),
        ("Matchup", "Injury", 1.0),
        ("Weather", "GameScript", 0.8),
        ("LineValue", "Trend", 0.7),
        ("Weather", "DVOA", 0.6),
        ("LineValue", "Matchup", 0.5),
    ]
    .into_iter()
    .map(|(a, b, strength)| SignalPairStrength {
        a: a.to_string(),
        b: b.to_string(),
        strength,
    })
    .collect()
}

fn default_materiality() -> f64 {
    0.20
}
fn default_exposure_cap() -> f64 {
    0.40
}
fn default_exposure_target() -> f64 {
    0.30
}
fn default_under_utilized() -> f64 {
    0.15
}
fn default_critical_exposure() -> f64 {
    0.60
}
fn default_high_exposure() -> f64 {
    0.40
}
fn default_watch_exposure() -> f64 {
    0.30
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            anti_predictive_signals: default_anti_predictive(),
            neutral_band: default_neutral_band(),
            neutral_weight_factor: default_neutral_weight_factor(),
            agreement_high: default_agreement_high(),
            agreement_penalty: default_agreement_penalty(),
            agreement_low: default_agreement_low(),
            agreement_bonus: default_agreement_bonus(),
            bias_divisor: default_bias_divisor(),
            bias_corrections: default_bias_corrections(),
            reliability_adjustments: default_reliability_adjustments(),
            strict_stat_types: false,
        }
    }
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            min_confidence: default_min_confidence(),
            targets: default_targets(),
            max_player_uses: default_max_player_uses(),
            max_player_exposure: default_max_player_exposure(),
            max_per_position: default_max_per_position(),
            allow_prop_reuse: false,
            collapse_opposite_sides: true,
            same_game_bonus: default_same_game_bonus(),
            diversification_bonus: default_diversification_bonus(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            start_thresholds: default_start_thresholds(),
            relaxation_points: default_relaxation_points(),
            max_attempts: default_max_attempts(),
            confidence_weight: default_confidence_weight(),
            independence_weight: default_independence_weight(),
            max_pair_strength: default_max_pair_strength(),
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            base_penalty: default_base_penalty(),
            penalty_floor: default_penalty_floor(),
            drivers_per_leg: default_drivers_per_leg(),
            strong_threshold: default_strong_threshold(),
            moderate_threshold: default_moderate_threshold(),
            strength_matrix: default_strength_matrix(),
        }
    }
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            materiality: default_materiality(),
            drivers_per_leg: default_drivers_per_leg(),
            cap: default_exposure_cap(),
            target: default_exposure_target(),
            under_utilized: default_under_utilized(),
            critical_exposure: default_critical_exposure(),
            high_exposure: default_high_exposure(),
            watch_exposure: default_watch_exposure(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signal_weights: default_signal_weights(),
            aggregation: AggregationConfig::default(),
            construction: ConstructionConfig::default(),
            optimizer: OptimizerConfig::default(),
            correlation: CorrelationConfig::default(),
            exposure: ExposureConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let parsed: EngineConfig = serde_json::from_str(
            r#"{
                "construction": {
                    "min_confidence": 65,
                    "mode": "optimizer",
                    "targets": { "legs_2": 4, "legs_3": 2, "legs_4": 1, "legs_5": 0 }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.construction.min_confidence, 65);
        assert_eq!(parsed.construction.mode, ConstructionMode::Optimizer);
        assert_eq!(parsed.construction.targets.get(2), Some(4));
        assert_eq!(parsed.construction.max_player_uses, 2);
        assert_eq!(parsed.optimizer.max_attempts, 30);
        assert_eq!(parsed.exposure.cap, 0.40);
        assert!(parsed.signal_weights.contains_key("DVOA"));
    }

    #[test]
    fn test_default_matrix_within_bounds() {
        for pair in default_strength_matrix() {
            assert!((0.5..=1.5).contains(&pair.strength), "{:?}", pair);
        }
    }

    #[test]
    fn test_per_size_lookup() {
        let targets = default_targets();
        assert_eq!(targets.get(5), Some(1));
        assert_eq!(targets.get(6), None);
        assert_eq!(targets.entries()[0], (2, 5));
    }
}
