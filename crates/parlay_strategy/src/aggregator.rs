//! Confidence aggregation.
//!
//! Turns a prop's signal breakdown into one calibrated integer confidence.
//! The pipeline always computes the OVER-perspective value first and only
//! then flips it for UNDER props:
//!
//! 1. Invert anti-predictive signals (`100 - score`).
//! 2. Dampen near-neutral signals to a fraction of their weight.
//! 3. Weighted mean (unweighted fallback, 50 with no signals).
//! 4. Agreement adjustment: penalise consensus, reward disagreement.
//! 5. Stat-type bias correction (scaled down) and reliability adjustment.
//! 6. Clamp, round, and invert for UNDER.
//!
//! Steps 5 and 6 must stay in that order: applying the stat corrections after
//! the UNDER flip would break `over + under == 100`.

use std::collections::BTreeMap;

use common::config::AggregationConfig;
use common::{ConfidenceResult, Direction, DrivingSignal, Error, Prop, SignalResult};
use serde::Serialize;
use tracing::debug;

const NEUTRAL: f64 = 50.0;

/// Intermediate values of one aggregation, for logging and audits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationTrace {
    pub weighted_mean: f64,
    /// Fraction of signals at or above neutral; `None` with no signals.
    pub agreement: Option<f64>,
    pub agreement_adjustment: f64,
    pub bias_adjustment: f64,
    pub reliability_adjustment: f64,
    pub over_confidence: u8,
    pub final_confidence: u8,
}

/// Weighted-signal aggregator.
#[derive(Debug, Clone)]
pub struct ConfidenceAggregator {
    config: AggregationConfig,
}

impl ConfidenceAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Final confidence for `direction` from a validated breakdown.
    pub fn aggregate(
        &self,
        signals: &BTreeMap<String, SignalResult>,
        stat_type: &str,
        direction: Direction,
    ) -> Result<u8, Error> {
        Ok(self.trace(signals, stat_type, direction)?.final_confidence)
    }

    /// Score a prop and package the breakdown into a [`ConfidenceResult`].
    pub fn evaluate(
        &self,
        prop: Prop,
        signals: BTreeMap<String, SignalResult>,
    ) -> Result<ConfidenceResult, Error> {
        let trace = self.trace(&signals, &prop.stat_type, prop.direction)?;
        debug!(
            "{}: mean={:.2} agree={:?} adj={:+.1} bias={:+.2} rel={:+.1} over={} final={}",
            prop.label(),
            trace.weighted_mean,
            trace.agreement,
            trace.agreement_adjustment,
            trace.bias_adjustment,
            trace.reliability_adjustment,
            trace.over_confidence,
            trace.final_confidence,
        );
        let driving_signals = driving_signals(&signals);

        Ok(ConfidenceResult {
            prop,
            final_confidence: trace.final_confidence,
            over_confidence: trace.over_confidence,
            signal_breakdown: signals,
            driving_signals,
        })
    }

    /// Run the full pipeline and keep every intermediate value.
    pub fn trace(
        &self,
        signals: &BTreeMap<String, SignalResult>,
        stat_type: &str,
        direction: Direction,
    ) -> Result<AggregationTrace, Error> {
        for (name, result) in signals {
            result.validate(name)?;
        }

        let cfg = &self.config;
        let scored: Vec<(f64, f64)> = signals
            .iter()
            .map(|(name, result)| (self.effective_score(name, result), result.weight))
            .collect();

        let weighted_mean = self.weighted_mean(&scored);

        let (agreement, agreement_adjustment) = if scored.is_empty() {
            (None, 0.0)
        } else {
            let agreeing = scored.iter().filter(|(s, _)| *s >= NEUTRAL).count();
            let fraction = agreeing as f64 / scored.len() as f64;
            let adjustment = if fraction >= cfg.agreement_high {
                -cfg.agreement_penalty
            } else if fraction <= cfg.agreement_low {
                cfg.agreement_bonus
            } else {
                0.0
            };
            (Some(fraction), adjustment)
        };

        let over_perspective = (weighted_mean + agreement_adjustment).clamp(0.0, 100.0);

        let bias = lookup_stat(&cfg.bias_corrections, stat_type);
        let reliability = lookup_stat(&cfg.reliability_adjustments, stat_type);
        if bias.is_none() && reliability.is_none() {
            if cfg.strict_stat_types {
                return Err(Error::UnknownStatType(stat_type.to_string()));
            }
            debug!("{}: no bias/reliability entry, no adjustment", stat_type);
        }
        let bias_adjustment = bias.unwrap_or(0.0) / cfg.bias_divisor;
        let reliability_adjustment = reliability.unwrap_or(0.0);

        let adjusted = over_perspective + bias_adjustment + reliability_adjustment;
        let over_confidence = to_confidence(adjusted);
        let final_confidence = match direction {
            Direction::Over => over_confidence,
            Direction::Under => 100 - over_confidence,
        };

        Ok(AggregationTrace {
            weighted_mean,
            agreement,
            agreement_adjustment,
            bias_adjustment,
            reliability_adjustment,
            over_confidence,
            final_confidence,
        })
    }

    fn effective_score(&self, name: &str, result: &SignalResult) -> f64 {
        if self.config.anti_predictive_signals.contains(name) {
            100.0 - result.raw_score
        } else {
            result.raw_score
        }
    }

    fn weighted_mean(&self, scored: &[(f64, f64)]) -> f64 {
        if scored.is_empty() {
            return NEUTRAL;
        }

        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;
        for (score, weight) in scored {
            let effective = if (score - NEUTRAL).abs() <= self.config.neutral_band {
                weight * self.config.neutral_weight_factor
            } else {
                *weight
            };
            total_weight += effective;
            weighted_sum += score * effective;
        }

        if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            scored.iter().map(|(s, _)| s).sum::<f64>() / scored.len() as f64
        }
    }
}

/// Clamp to [0, 100] and round to the emitted integer.
fn to_confidence(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}

/// Case-insensitive stat-type lookup.
fn lookup_stat(table: &BTreeMap<String, f64>, stat_type: &str) -> Option<f64> {
    table.get(stat_type).copied().or_else(|| {
        table
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(stat_type.trim()))
            .map(|(_, v)| *v)
    })
}

/// Rank signals by weighted deviation from neutral.
///
/// `impact = |raw - 50| * weight / total_weight`; each signal's contribution
/// is its share of the summed impact. Neutral signals are left out.
pub fn driving_signals(signals: &BTreeMap<String, SignalResult>) -> Vec<DrivingSignal> {
    let total_weight: f64 = signals.values().map(|s| s.weight).sum();
    if total_weight <= 0.0 {
        return Vec::new();
    }

    let mut impacts: Vec<(&str, f64)> = signals
        .iter()
        .map(|(name, s)| {
            (
                name.as_str(),
                (s.raw_score - NEUTRAL).abs() * s.weight / total_weight,
            )
        })
        .filter(|(_, impact)| *impact > 0.0)
        .collect();

    let total_impact: f64 = impacts.iter().map(|(_, i)| i).sum();
    if total_impact <= 0.0 {
        return Vec::new();
    }

    impacts.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    impacts
        .into_iter()
        .map(|(name, impact)| DrivingSignal {
            name: name.to_string(),
            contribution: impact / total_impact,
        })
        .collect()
}
