//! "One player, one parlay" optimizer.
//!
//! Trades a little confidence for independence: legs are ranked on a blend of
//! confidence and how unusual their player/game/stat is in the pool, a player
//! used once is gone for the rest of the batch, and strongly correlated legs
//! are never paired. Thresholds start high and relax per attempt.

use std::collections::HashMap;

use common::config::{ConstructionConfig, OptimizerConfig};
use common::{ConfidenceResult, Error};
use tracing::{debug, info};

use crate::builder::check_size;
use crate::correlation::CorrelationAnalyzer;
use crate::ledger::AllocationLedger;
use crate::parlay::{assemble, fits_position_limit, has_player, signature_of, ParlayCandidate};

/// `100 × mean(1/freq(player), 1/freq(game), 1/freq(stat_type))` per leg.
pub fn independence_scores(pool: &[ConfidenceResult]) -> Vec<f64> {
    let mut players: HashMap<&str, usize> = HashMap::new();
    let mut games = HashMap::new();
    let mut stats: HashMap<&str, usize> = HashMap::new();
    for leg in pool {
        *players.entry(leg.prop.player.as_str()).or_insert(0) += 1;
        *games.entry(leg.prop.game()).or_insert(0usize) += 1;
        *stats.entry(leg.prop.stat_type.as_str()).or_insert(0) += 1;
    }

    pool.iter()
        .map(|leg| {
            let p = players[leg.prop.player.as_str()] as f64;
            let g = games[&leg.prop.game()] as f64;
            let s = stats[leg.prop.stat_type.as_str()] as f64;
            100.0 * (1.0 / p + 1.0 / g + 1.0 / s) / 3.0
        })
        .collect()
}

pub struct ParlayOptimizer<'a> {
    construction: &'a ConstructionConfig,
    optimizer: &'a OptimizerConfig,
    analyzer: &'a CorrelationAnalyzer,
}

impl<'a> ParlayOptimizer<'a> {
    pub fn new(
        construction: &'a ConstructionConfig,
        optimizer: &'a OptimizerConfig,
        analyzer: &'a CorrelationAnalyzer,
    ) -> Self {
        Self {
            construction,
            optimizer,
            analyzer,
        }
    }

    /// Pool sorted by the confidence/independence blend, best first.
    pub fn rank<'p>(&self, pool: &'p [ConfidenceResult]) -> Vec<&'p ConfidenceResult> {
        let independence = independence_scores(pool);
        let mut scored: Vec<(f64, &ConfidenceResult)> = pool
            .iter()
            .zip(independence)
            .map(|(leg, ind)| {
                let score = self.optimizer.confidence_weight * leg.final_confidence as f64
                    + self.optimizer.independence_weight * ind;
                (score, leg)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, leg)| leg).collect()
    }

    /// Confidence floor for `attempt`, relaxing linearly to
    /// `start - relaxation_points` on the last attempt.
    pub fn threshold(&self, size: usize, attempt: u32) -> Result<f64, Error> {
        let start = self
            .optimizer
            .start_thresholds
            .get(size)
            .ok_or(Error::InvalidParlaySize(size))?;
        let steps = self.optimizer.max_attempts.saturating_sub(1);
        if steps == 0 {
            return Ok(start);
        }
        Ok(start - self.optimizer.relaxation_points * attempt.min(steps) as f64 / steps as f64)
    }

    pub fn build(
        &self,
        size: usize,
        target: usize,
        pool: &[ConfidenceResult],
        ledger: &mut AllocationLedger,
    ) -> Result<Vec<ParlayCandidate>, Error> {
        check_size(size)?;

        let ranked = self.rank(pool);
        let mut parlays = Vec::with_capacity(target);

        'targets: while parlays.len() < target {
            for attempt in 0..self.optimizer.max_attempts {
                let threshold = self.threshold(size, attempt)?;
                let eligible: Vec<&ConfidenceResult> = ranked
                    .iter()
                    .copied()
                    .filter(|leg| {
                        ledger.player_uses(&leg.prop.player) == 0
                            && ledger.is_available(leg)
                            && leg.final_confidence as f64 >= threshold
                    })
                    .collect();
                if eligible.len() < size {
                    continue;
                }

                let anchor = eligible[attempt as usize % eligible.len()];
                let Some(legs) = self.fill(size, anchor, &eligible) else {
                    continue;
                };
                // Unreachable while every leg needs an unused player.
                if ledger.has_emitted(&signature_of(&legs)) {
                    debug!("{}-leg: attempt {} duplicated an emitted parlay", size, attempt);
                    continue;
                }

                ledger.commit(&legs);
                let parlay = assemble(legs, self.construction, self.analyzer);
                debug!(
                    "{}-leg parlay {} on attempt {} (threshold {:.1}): combined={}",
                    size, parlay.id, attempt, threshold, parlay.combined_confidence
                );
                parlays.push(parlay);
                continue 'targets;
            }

            debug!(
                "{}-leg: {} attempts failed, abandoning size at {}/{}",
                size,
                self.optimizer.max_attempts,
                parlays.len(),
                target
            );
            break;
        }

        info!("Optimized {}/{} {}-leg parlays", parlays.len(), target, size);
        Ok(parlays)
    }

    fn fill(
        &self,
        size: usize,
        anchor: &ConfidenceResult,
        eligible: &[&ConfidenceResult],
    ) -> Option<Vec<ConfidenceResult>> {
        let mut legs = vec![anchor.clone()];

        for leg in eligible {
            if legs.len() == size {
                break;
            }
            if has_player(&legs, &leg.prop.player)
                || !fits_position_limit(&legs, &leg.prop.position, self.construction.max_per_position)
                || self.too_correlated(&legs, leg)
            {
                continue;
            }
            legs.push((*leg).clone());
        }

        (legs.len() == size).then_some(legs)
    }

    fn too_correlated(&self, legs: &[ConfidenceResult], candidate: &ConfidenceResult) -> bool {
        legs.iter().any(|leg| {
            self.analyzer
                .shared_strength(leg, candidate)
                .is_some_and(|(_, strength)| strength >= self.optimizer.max_pair_strength)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::CorrelationConfig;
    use common::{Direction, DrivingSignal, Prop};
    use std::collections::{BTreeMap, HashSet};

    fn make_result(
        player: &str,
        team: &str,
        position: &str,
        confidence: u8,
        drivers: &[&str],
    ) -> ConfidenceResult {
        ConfidenceResult {
            prop: Prop {
                player: player.into(),
                team: team.into(),
                opponent: "OPP".into(),
                position: position.into(),
                stat_type: "Receiving Yards".into(),
                line: 60.5,
                direction: Direction::Over,
            },
            final_confidence: confidence,
            over_confidence: confidence,
            signal_breakdown: BTreeMap::new(),
            driving_signals: drivers
                .iter()
                .map(|d| DrivingSignal {
                    name: d.to_string(),
                    contribution: 0.5,
                })
                .collect(),
        }
    }

    fn deep_pool() -> Vec<ConfidenceResult> {
        let positions = ["QB", "RB", "WR", "TE"];
        (0..12)
            .map(|i| {
                make_result(
                    &format!("Player {}", i),
                    &format!("T{}", i % 6),
                    positions[i % 4],
                    80 - i as u8,
                    &[],
                )
            })
            .collect()
    }

    #[test]
    fn test_independence_favours_rare_props() {
        let pool = vec![
            make_result("A", "BUF", "QB", 70, &[]),
            make_result("B", "BUF", "WR", 70, &[]),
            make_result("C", "KC", "RB", 70, &[]),
        ];
        let scores = independence_scores(&pool);
        // Same stat everywhere (1/3); A and B share a game.
        assert!((scores[0] - 100.0 * (1.0 + 0.5 + 1.0 / 3.0) / 3.0).abs() < 1e-9);
        assert!(scores[2] > scores[0]);
    }

    #[test]
    fn test_threshold_relaxes_linearly() {
        let construction = ConstructionConfig::default();
        let optimizer = OptimizerConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let opt = ParlayOptimizer::new(&construction, &optimizer, &analyzer);
        assert_eq!(opt.threshold(2, 0).unwrap(), 68.0);
        assert_eq!(opt.threshold(5, 29).unwrap(), 47.0);
        assert!(opt.threshold(7, 0).is_err());
    }

    #[test]
    fn test_each_player_used_once_across_sizes() {
        let construction = ConstructionConfig::default();
        let optimizer = OptimizerConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let opt = ParlayOptimizer::new(&construction, &optimizer, &analyzer);
        let pool = deep_pool();
        let mut ledger = AllocationLedger::new(2, false);

        let mut all = opt.build(2, 3, &pool, &mut ledger).unwrap();
        all.extend(opt.build(3, 2, &pool, &mut ledger).unwrap());
        assert_eq!(all.len(), 5, "12 players cover 3 pairs and 2 triples");

        let mut players: Vec<&str> = all
            .iter()
            .flat_map(|p| p.legs.iter().map(|l| l.prop.player.as_str()))
            .collect();
        let total = players.len();
        players.sort();
        players.dedup();
        assert_eq!(players.len(), total);

        let signatures: HashSet<_> = all.iter().map(|p| p.signature()).collect();
        assert_eq!(signatures.len(), all.len());
    }

    #[test]
    fn test_relaxation_admits_weaker_legs() {
        let construction = ConstructionConfig::default();
        let optimizer = OptimizerConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let opt = ParlayOptimizer::new(&construction, &optimizer, &analyzer);
        let pool = vec![
            make_result("A", "BUF", "QB", 61, &[]),
            make_result("B", "KC", "WR", 60, &[]),
        ];
        let mut ledger = AllocationLedger::new(2, false);
        assert_eq!(opt.build(2, 1, &pool, &mut ledger).unwrap().len(), 1);
    }

    #[test]
    fn test_strongly_correlated_legs_not_paired() {
        let construction = ConstructionConfig::default();
        let optimizer = OptimizerConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let opt = ParlayOptimizer::new(&construction, &optimizer, &analyzer);
        let pool = vec![
            make_result("A", "BUF", "QB", 80, &["DVOA", "Matchup"]),
            make_result("B", "KC", "WR", 78, &["Matchup", "DVOA"]),
            make_result("C", "DET", "RB", 70, &["Weather"]),
        ];
        let mut ledger = AllocationLedger::new(2, false);
        let parlays = opt.build(2, 1, &pool, &mut ledger).unwrap();
        assert_eq!(parlays.len(), 1);
        let players: Vec<&str> = parlays[0].legs.iter().map(|l| l.prop.player.as_str()).collect();
        assert!(players.contains(&"C"));
        assert_eq!(parlays[0].correlation_bonus, construction.diversification_bonus);
    }

    #[test]
    fn test_thin_pool_abandons_size() {
        let construction = ConstructionConfig::default();
        let optimizer = OptimizerConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let opt = ParlayOptimizer::new(&construction, &optimizer, &analyzer);
        let pool = vec![make_result("A", "BUF", "QB", 90, &[])];
        let mut ledger = AllocationLedger::new(2, false);
        assert!(opt.build(2, 2, &pool, &mut ledger).unwrap().is_empty());
    }
}
