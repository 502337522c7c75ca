//! Parlay candidates and their assembly.

use std::collections::{HashMap, HashSet};

use common::config::ConstructionConfig;
use common::{ConfidenceResult, PropId};
use serde::Serialize;
use uuid::Uuid;

use crate::correlation::{CorrelationAnalyzer, CorrelationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStructure {
    /// Every leg from one game.
    SameGame,
    /// Every leg from a different game.
    Diversified,
    Mixed,
}

/// An emitted multi-leg parlay. Never mutated after assembly.
#[derive(Debug, Clone, Serialize)]
pub struct ParlayCandidate {
    pub id: Uuid,
    pub legs: Vec<ConfidenceResult>,
    pub risk_level: RiskLevel,
    pub game_structure: GameStructure,
    pub rationale: String,
    /// Structure bonus plus correlation penalty; may be negative.
    pub correlation_bonus: i32,
    pub correlation_warnings: Vec<String>,
    pub combined_confidence: u8,
}

impl ParlayCandidate {
    pub fn size(&self) -> usize {
        self.legs.len()
    }

    /// Sorted direction-qualified leg identities; equal signatures mean the
    /// same bet.
    pub fn signature(&self) -> Vec<PropId> {
        signature_of(&self.legs)
    }
}

pub(crate) fn signature_of(legs: &[ConfidenceResult]) -> Vec<PropId> {
    let mut ids: Vec<PropId> = legs.iter().map(|l| l.prop.id()).collect();
    ids.sort();
    ids
}

fn mean_confidence(legs: &[ConfidenceResult]) -> f64 {
    if legs.is_empty() {
        return 0.0;
    }
    legs.iter().map(|l| l.final_confidence as f64).sum::<f64>() / legs.len() as f64
}

/// `clamp(round(mean + bonus), 0, 100)`.
pub fn combined_confidence(legs: &[ConfidenceResult], bonus: i32) -> u8 {
    (mean_confidence(legs) + bonus as f64).round().clamp(0.0, 100.0) as u8
}

/// Game structure, risk level and structure bonus for a leg set.
pub fn assess_structure(
    legs: &[ConfidenceResult],
    config: &ConstructionConfig,
) -> (GameStructure, RiskLevel, i32) {
    let size = legs.len();
    let games: HashSet<_> = legs.iter().map(|l| l.prop.game()).collect();

    if games.len() == 1 {
        let risk = match size {
            0..=2 => RiskLevel::Moderate,
            3 | 4 => RiskLevel::High,
            _ => RiskLevel::VeryHigh,
        };
        let bonus = if size <= 2 { config.same_game_bonus } else { 0 };
        (GameStructure::SameGame, risk, bonus)
    } else if games.len() == size {
        let risk = if size <= 3 {
            RiskLevel::Low
        } else {
            RiskLevel::Moderate
        };
        (GameStructure::Diversified, risk, config.diversification_bonus)
    } else {
        let risk = if size <= 3 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        };
        (GameStructure::Mixed, risk, 0)
    }
}

/// Whether adding `position` keeps every position under the per-parlay cap.
pub fn fits_position_limit(legs: &[ConfidenceResult], position: &str, max_per_position: usize) -> bool {
    legs.iter().filter(|l| l.prop.position == position).count() < max_per_position
}

/// Whether `player` already has a leg in `legs`.
pub fn has_player(legs: &[ConfidenceResult], player: &str) -> bool {
    legs.iter().any(|l| l.prop.player == player)
}

/// Annotate a complete leg set.
pub fn assemble(
    legs: Vec<ConfidenceResult>,
    config: &ConstructionConfig,
    analyzer: &CorrelationAnalyzer,
) -> ParlayCandidate {
    let (game_structure, risk_level, structure_bonus) = assess_structure(&legs, config);
    let report = analyzer.analyze(&legs);
    let correlation_bonus = structure_bonus + report.total_penalty;
    let combined = combined_confidence(&legs, correlation_bonus);
    let rationale = describe(&legs, game_structure, structure_bonus, &report);

    ParlayCandidate {
        id: Uuid::new_v4(),
        legs,
        risk_level,
        game_structure,
        rationale,
        correlation_bonus,
        correlation_warnings: report.warnings,
        combined_confidence: combined,
    }
}

fn describe(
    legs: &[ConfidenceResult],
    structure: GameStructure,
    structure_bonus: i32,
    report: &CorrelationReport,
) -> String {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for leg in legs {
        *positions.entry(leg.prop.position.as_str()).or_insert(0) += 1;
    }

    let structure_note = match structure {
        GameStructure::SameGame => "same-game stack",
        GameStructure::Diversified => "one leg per game",
        GameStructure::Mixed => "mixed games",
    };

    let mut text = format!(
        "{}-leg parlay, mean leg confidence {:.1}, {} ({:+}) across {} positions",
        legs.len(),
        mean_confidence(legs),
        structure_note,
        structure_bonus,
        positions.len()
    );
    if report.total_penalty != 0 {
        text.push_str(&format!(
            "; correlation penalty {} over {} leg pair(s)",
            report.total_penalty,
            report.pairs.len()
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::CorrelationConfig;
    use common::{Direction, DrivingSignal, Prop};
    use std::collections::BTreeMap;

    fn make_result(
        player: &str,
        team: &str,
        opponent: &str,
        position: &str,
        confidence: u8,
        drivers: &[&str],
    ) -> ConfidenceResult {
        ConfidenceResult {
            prop: Prop {
                player: player.into(),
                team: team.into(),
                opponent: opponent.into(),
                position: position.into(),
                stat_type: "Receiving Yards".into(),
                line: 55.5,
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

    #[test]
    fn test_same_game_pair_gets_bonus() {
        let legs = vec![
            make_result("A", "BUF", "MIA", "QB", 70, &[]),
            make_result("B", "MIA", "BUF", "WR", 66, &[]),
        ];
        let (structure, risk, bonus) = assess_structure(&legs, &ConstructionConfig::default());
        assert_eq!(structure, GameStructure::SameGame);
        assert_eq!(risk, RiskLevel::Moderate);
        assert_eq!(bonus, 3);
    }

    #[test]
    fn test_structure_classification_by_size() {
        let config = ConstructionConfig::default();
        let same: Vec<_> = (0..5)
            .map(|i| make_result(&format!("P{}", i), "BUF", "MIA", "WR", 70, &[]))
            .collect();
        assert_eq!(assess_structure(&same[..3], &config).1, RiskLevel::High);
        assert_eq!(assess_structure(&same, &config).1, RiskLevel::VeryHigh);

        let teams = ["BUF", "KC", "DET", "SF", "BAL"];
        let diverse: Vec<_> = teams
            .iter()
            .enumerate()
            .map(|(i, t)| make_result(&format!("P{}", i), t, "OPP", "WR", 70, &[]))
            .collect();
        // Every opponent is "OPP" but each team differs, so games differ.
        assert_eq!(
            assess_structure(&diverse[..3], &config),
            (GameStructure::Diversified, RiskLevel::Low, 2)
        );
        assert_eq!(assess_structure(&diverse[..4], &config).1, RiskLevel::Moderate);

        let mixed = vec![same[0].clone(), same[1].clone(), diverse[1].clone(), diverse[2].clone()];
        assert_eq!(
            assess_structure(&mixed, &config),
            (GameStructure::Mixed, RiskLevel::High, 0)
        );
        assert_eq!(assess_structure(&mixed[..3], &config).1, RiskLevel::Moderate);
    }

    #[test]
    fn test_combined_confidence_clamps() {
        let legs = vec![
            make_result("A", "BUF", "MIA", "QB", 99, &[]),
            make_result("B", "KC", "LV", "WR", 100, &[]),
        ];
        assert_eq!(combined_confidence(&legs, 5), 100);
        assert_eq!(combined_confidence(&legs, -200), 0);
        assert_eq!(combined_confidence(&legs, -10), 90);
    }

    #[test]
    fn test_assemble_combines_structure_and_penalty() {
        let legs = vec![
            make_result("A", "BUF", "MIA", "QB", 80, &["DVOA", "Matchup"]),
            make_result("B", "KC", "LV", "WR", 70, &["Matchup", "DVOA"]),
        ];
        let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
        let parlay = assemble(legs, &ConstructionConfig::default(), &analyzer);

        // +2 diversification, -8 correlation.
        assert_eq!(parlay.correlation_bonus, -6);
        assert_eq!(parlay.combined_confidence, 69);
        assert_eq!(parlay.correlation_warnings.len(), 1);
        assert_eq!(parlay.size(), 2);
        assert!(parlay.rationale.contains("correlation penalty -8"));
    }

    #[test]
    fn test_position_limit() {
        let legs = vec![
            make_result("A", "BUF", "MIA", "WR", 70, &[]),
            make_result("B", "BUF", "MIA", "WR", 70, &[]),
        ];
        assert!(!fits_position_limit(&legs, "WR", 2));
        assert!(fits_position_limit(&legs, "TE", 2));
        assert!(has_player(&legs, "A"));
    }
}
