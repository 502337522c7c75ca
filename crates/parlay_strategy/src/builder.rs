//! Standard greedy parlay construction.

use std::collections::HashSet;

use common::config::ConstructionConfig;
use common::{ConfidenceResult, Error, PropId};
use tracing::{debug, info};

use crate::correlation::CorrelationAnalyzer;
use crate::ledger::AllocationLedger;
use crate::parlay::{assemble, fits_position_limit, has_player, signature_of, ParlayCandidate};

pub const MIN_LEGS: usize = 2;
pub const MAX_LEGS: usize = 5;

pub(crate) fn check_size(size: usize) -> Result<(), Error> {
    if (MIN_LEGS..=MAX_LEGS).contains(&size) {
        Ok(())
    } else {
        Err(Error::InvalidParlaySize(size))
    }
}

/// Greedy constructor over a ranked pool.
pub struct ParlayBuilder<'a> {
    config: &'a ConstructionConfig,
    analyzer: &'a CorrelationAnalyzer,
}

impl<'a> ParlayBuilder<'a> {
    pub fn new(config: &'a ConstructionConfig, analyzer: &'a CorrelationAnalyzer) -> Self {
        Self { config, analyzer }
    }

    /// Build up to `target` parlays of exactly `size` legs.
    ///
    /// `pool` must already be ranked strongest first. Each pass scans it from
    /// the top, with props already committed pushed behind fresh ones. A
    /// scan that reproduces an emitted leg set is retried without its last
    /// leg; the size ends once no new leg set can be filled.
    pub fn build(
        &self,
        size: usize,
        target: usize,
        pool: &[ConfidenceResult],
        ledger: &mut AllocationLedger,
    ) -> Result<Vec<ParlayCandidate>, Error> {
        check_size(size)?;

        let mut parlays = Vec::with_capacity(target);

        while parlays.len() < target {
            let Some(legs) = self.next_legs(size, pool, ledger) else {
                debug!(
                    "{}-leg: pool exhausted after {}/{} parlays",
                    size,
                    parlays.len(),
                    target
                );
                break;
            };

            ledger.commit(&legs);
            let parlay = assemble(legs, self.config, self.analyzer);
            debug!(
                "{}-leg parlay {}: combined={} bonus={:+} risk={:?}",
                size,
                parlay.id,
                parlay.combined_confidence,
                parlay.correlation_bonus,
                parlay.risk_level
            );
            parlays.push(parlay);
        }

        info!("Built {}/{} {}-leg parlays", parlays.len(), target, size);
        Ok(parlays)
    }

    /// First fill whose leg set has not been emitted yet.
    fn next_legs(
        &self,
        size: usize,
        pool: &[ConfidenceResult],
        ledger: &AllocationLedger,
    ) -> Option<Vec<ConfidenceResult>> {
        let mut order: Vec<&ConfidenceResult> = pool.iter().collect();
        order.sort_by_key(|leg| ledger.prop_uses(&leg.prop.id()));

        let mut excluded: HashSet<PropId> = HashSet::new();
        loop {
            let legs = self.fill(size, &order, ledger, &excluded)?;
            if !ledger.has_emitted(&signature_of(&legs)) {
                return Some(legs);
            }
            // Only reachable with prop reuse enabled.
            let last = legs.last()?;
            debug!(
                "{}-leg: scan repeated an emitted parlay, dropping {}",
                size,
                last.prop.label()
            );
            excluded.insert(last.prop.id());
        }
    }

    fn fill(
        &self,
        size: usize,
        order: &[&ConfidenceResult],
        ledger: &AllocationLedger,
        excluded: &HashSet<PropId>,
    ) -> Option<Vec<ConfidenceResult>> {
        let mut legs: Vec<ConfidenceResult> = Vec::with_capacity(size);

        for &leg in order {
            if legs.len() == size {
                break;
            }
            if !ledger.is_available(leg)
                || excluded.contains(&leg.prop.id())
                || has_player(&legs, &leg.prop.player)
                || !fits_position_limit(&legs, &leg.prop.position, self.config.max_per_position)
            {
                continue;
            }
            legs.push(leg.clone());
        }

        (legs.len() == size).then_some(legs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::CorrelationConfig;
    use common::{Direction, Prop};
    use std::collections::BTreeMap;

    fn make_result(player: &str, team: &str, position: &str, confidence: u8) -> ConfidenceResult {
        ConfidenceResult {
            prop: Prop {
                player: player.into(),
                team: team.into(),
                opponent: "OPP".into(),
                position: position.into(),
                stat_type: "Receiving Yards".into(),
                line: 48.5,
                direction: Direction::Over,
            },
            final_confidence: confidence,
            over_confidence: confidence,
            signal_breakdown: BTreeMap::new(),
            driving_signals: vec![],
        }
    }

    fn scenario_pool() -> Vec<ConfidenceResult> {
        vec![
            make_result("Josh Allen", "BUF", "QB", 80),
            make_result("Bijan Robinson", "ATL", "RB", 75),
            make_result("Puka Nacua", "LAR", "WR", 70),
            make_result("Sam LaPorta", "DET", "TE", 65),
            make_result("Jordan Love", "GB", "QB", 60),
        ]
    }

    #[test]
    fn test_top_two_props_form_the_pair() {
        let config = ConstructionConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let builder = ParlayBuilder::new(&config, &analyzer);
        let mut ledger = AllocationLedger::new(2, false);

        let parlays = builder.build(2, 1, &scenario_pool(), &mut ledger).unwrap();
        assert_eq!(parlays.len(), 1);
        let confidences: Vec<u8> = parlays[0].legs.iter().map(|l| l.final_confidence).collect();
        assert_eq!(confidences, vec![80, 75]);
        assert!(parlays[0].combined_confidence >= 60);
    }

    #[test]
    fn test_position_cap_discards_single_position_pool() {
        let config = ConstructionConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let builder = ParlayBuilder::new(&config, &analyzer);
        let mut ledger = AllocationLedger::new(2, false);

        let pool: Vec<_> = (0..6)
            .map(|i| make_result(&format!("WR{}", i), "BUF", "WR", 70))
            .collect();
        let parlays = builder.build(4, 1, &pool, &mut ledger).unwrap();
        assert!(parlays.is_empty());
        assert_eq!(ledger.used_prop_count(), 0, "partial never committed");
    }

    #[test]
    fn test_props_not_reused_across_parlays() {
        let config = ConstructionConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let builder = ParlayBuilder::new(&config, &analyzer);
        let mut ledger = AllocationLedger::new(2, false);

        let parlays = builder.build(2, 5, &scenario_pool(), &mut ledger).unwrap();
        // Five props, two per parlay.
        assert_eq!(parlays.len(), 2);
        let mut ids: Vec<_> = parlays.iter().flat_map(|p| p.signature()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
        for parlay in &parlays {
            assert_eq!(parlay.size(), 2);
        }
    }

    #[test]
    fn test_reuse_shares_props_across_parlays() {
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());

        let strict = ConstructionConfig::default();
        let mut strict_ledger = AllocationLedger::new(2, false);
        let without = ParlayBuilder::new(&strict, &analyzer)
            .build(2, 3, &scenario_pool(), &mut strict_ledger)
            .unwrap();

        let config = ConstructionConfig {
            allow_prop_reuse: true,
            ..ConstructionConfig::default()
        };
        let mut ledger = AllocationLedger::new(2, true);
        let parlays = ParlayBuilder::new(&config, &analyzer)
            .build(2, 3, &scenario_pool(), &mut ledger)
            .unwrap();

        assert_eq!(without.len(), 2);
        assert_eq!(parlays.len(), 3);
        assert!(parlays.len() >= without.len());

        // 80+75, 70+65, then the unused 60 pairs with the freshest repeat.
        let confidences: Vec<Vec<u8>> = parlays
            .iter()
            .map(|p| p.legs.iter().map(|l| l.final_confidence).collect())
            .collect();
        assert_eq!(confidences, vec![vec![80, 75], vec![70, 65], vec![60, 80]]);

        let allen = scenario_pool()[0].prop.id();
        let holding_allen = parlays
            .iter()
            .filter(|p| p.signature().contains(&allen))
            .count();
        assert_eq!(holding_allen, 2);
        assert_eq!(ledger.player_uses("Josh Allen"), 2);

        let signatures: HashSet<_> = parlays.iter().map(|p| p.signature()).collect();
        assert_eq!(signatures.len(), parlays.len());
    }

    #[test]
    fn test_reuse_never_repeats_a_leg_set() {
        let config = ConstructionConfig {
            allow_prop_reuse: true,
            ..ConstructionConfig::default()
        };
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let builder = ParlayBuilder::new(&config, &analyzer);
        let mut ledger = AllocationLedger::new(10, true);

        let pool = vec![
            make_result("Josh Allen", "BUF", "QB", 80),
            make_result("Bijan Robinson", "ATL", "RB", 75),
            make_result("Puka Nacua", "LAR", "WR", 70),
        ];
        let parlays = builder.build(2, 10, &pool, &mut ledger).unwrap();
        // Three props give exactly three distinct pairs.
        assert_eq!(parlays.len(), 3);
        let signatures: HashSet<_> = parlays.iter().map(|p| p.signature()).collect();
        assert_eq!(signatures.len(), 3);

        // The ledger remembers them for the next call too.
        assert!(builder.build(2, 1, &pool, &mut ledger).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_size_rejected() {
        let config = ConstructionConfig::default();
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let builder = ParlayBuilder::new(&config, &analyzer);
        let mut ledger = AllocationLedger::new(2, false);
        assert!(matches!(
            builder.build(6, 1, &scenario_pool(), &mut ledger),
            Err(Error::InvalidParlaySize(6))
        ));
    }
}
