//! Correlation risk between parlay legs.
//!
//! Two legs are treated as correlated when their top driving signals overlap:
//! if the same inputs are pushing both legs, one bad read sinks both.

use std::collections::{BTreeSet, HashMap};

use common::config::{CorrelationConfig, SignalPairStrength};
use common::ConfidenceResult;
use serde::Serialize;

/// Strength used when the overlap is one signal or an unlisted pair.
const DEFAULT_STRENGTH: f64 = 1.0;

// ── Matrix ────────────────────────────────────────────────────────────

/// Symmetric signal-pair strength lookup.
#[derive(Debug, Clone, Default)]
pub struct CorrelationMatrix {
    strengths: HashMap<(String, String), f64>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl CorrelationMatrix {
    pub fn from_pairs(pairs: &[SignalPairStrength]) -> Self {
        let strengths = pairs
            .iter()
            .map(|p| (pair_key(&p.a, &p.b), p.strength))
            .collect();
        Self { strengths }
    }

    pub fn strength(&self, a: &str, b: &str) -> Option<f64> {
        self.strengths.get(&pair_key(a, b)).copied()
    }
}

// ── Report ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrelationTier {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationTier::Strong => "strong",
            CorrelationTier::Moderate => "moderate",
            CorrelationTier::Weak => "weak",
        }
    }
}

/// Penalty contributed by one correlated leg pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairPenalty {
    /// Leg indices within the parlay.
    pub left: usize,
    pub right: usize,
    pub shared: Vec<String>,
    pub strength: f64,
    /// Unrounded, always negative.
    pub penalty: f64,
    pub tier: CorrelationTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    /// Floored and rounded sum of pair penalties, never positive.
    pub total_penalty: i32,
    /// Unfloored sum.
    pub raw_penalty: f64,
    pub pairs: Vec<PairPenalty>,
    pub warnings: Vec<String>,
}

impl CorrelationReport {
    pub fn is_clean(&self) -> bool {
        self.pairs.is_empty()
    }
}

// ── Analyzer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
    matrix: CorrelationMatrix,
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig) -> Self {
        let matrix = CorrelationMatrix::from_pairs(&config.strength_matrix);
        Self { config, matrix }
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    pub fn matrix(&self) -> &CorrelationMatrix {
        &self.matrix
    }

    fn top_drivers<'r>(&self, leg: &'r ConfidenceResult) -> BTreeSet<&'r str> {
        leg.top_drivers(self.config.drivers_per_leg)
            .into_iter()
            .collect()
    }

    /// Shared top drivers of two legs and the strength of that overlap.
    ///
    /// `None` when the legs share no driver. With two or more shared names the
    /// strongest listed pair among them wins.
    pub fn shared_strength(
        &self,
        a: &ConfidenceResult,
        b: &ConfidenceResult,
    ) -> Option<(Vec<String>, f64)> {
        let left = self.top_drivers(a);
        let right = self.top_drivers(b);
        let shared: Vec<&str> = left.intersection(&right).copied().collect();

        let strength = match shared.len() {
            0 => return None,
            1 => DEFAULT_STRENGTH,
            _ => {
                let mut best: Option<f64> = None;
                for (i, x) in shared.iter().enumerate() {
                    for y in &shared[i + 1..] {
                        if let Some(s) = self.matrix.strength(x, y) {
                            best = Some(best.map_or(s, |b: f64| b.max(s)));
                        }
                    }
                }
                best.unwrap_or(DEFAULT_STRENGTH)
            }
        };

        Some((shared.into_iter().map(String::from).collect(), strength))
    }

    pub fn tier(&self, strength: f64) -> CorrelationTier {
        if strength >= self.config.strong_threshold {
            CorrelationTier::Strong
        } else if strength >= self.config.moderate_threshold {
            CorrelationTier::Moderate
        } else {
            CorrelationTier::Weak
        }
    }

    /// Penalise every leg pair that shares driving signals.
    pub fn analyze(&self, legs: &[ConfidenceResult]) -> CorrelationReport {
        let mut pairs = Vec::new();
        let mut warnings = Vec::new();

        for i in 0..legs.len() {
            for j in (i + 1)..legs.len() {
                let Some((shared, strength)) = self.shared_strength(&legs[i], &legs[j]) else {
                    continue;
                };
                let penalty = -self.config.base_penalty * strength;
                let tier = self.tier(strength);
                warnings.push(format!(
                    "{} / {} share {} ({} correlation, {:.1})",
                    legs[i].prop.player,
                    legs[j].prop.player,
                    shared.join(", "),
                    tier.as_str(),
                    strength
                ));
                pairs.push(PairPenalty {
                    left: i,
                    right: j,
                    shared,
                    strength,
                    penalty,
                    tier,
                });
            }
        }

        let raw_penalty: f64 = pairs.iter().map(|p| p.penalty).sum();
        let total_penalty = raw_penalty.max(self.config.penalty_floor).round() as i32;

        CorrelationReport {
            total_penalty,
            raw_penalty,
            pairs,
            warnings,
        }
    }
}
