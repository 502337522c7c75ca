//! Signal scorer capability and the weighted scorer registry.
//!
//! Scorers are the pluggable heuristics that have an opinion about a prop.
//! The registry owns them together with their configured weights and turns
//! their opinions into a typed signal breakdown for the aggregator.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use common::{Direction, Error, Prop, PropKey, SignalOpinion, SignalResult};
use tracing::debug;

// ── Scorer capability ─────────────────────────────────────────────────

/// A named heuristic that scores a prop against some context `C`.
///
/// Returning `None` means "no opinion"; the signal is then absent from the
/// breakdown rather than counted as neutral.
pub trait Scorer<C: ?Sized> {
    fn name(&self) -> &str;

    fn score(&self, prop: &Prop, context: &C) -> Option<SignalOpinion>;
}

/// Registered scorers and their weights, in registration order.
pub struct ScorerRegistry<C: ?Sized> {
    entries: Vec<(Arc<dyn Scorer<C>>, f64)>,
}

impl<C: ?Sized> Default for ScorerRegistry<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<C: ?Sized> ScorerRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scorer with its weight. Names must be unique.
    pub fn register(&mut self, scorer: Arc<dyn Scorer<C>>, weight: f64) -> Result<(), Error> {
        let name = scorer.name().to_string();
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidSignal {
                name,
                reason: format!("weight {} must be finite and >= 0", weight),
            });
        }
        if self.entries.iter().any(|(s, _)| s.name() == name) {
            return Err(Error::InvalidSignal {
                name,
                reason: "scorer already registered".into(),
            });
        }
        self.entries.push((scorer, weight));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(s, _)| s.name()).collect()
    }

    /// Run every scorer against the OVER view of `prop`.
    ///
    /// An opinion that explicitly leans UNDER is flipped (`100 - score`) so
    /// every breakdown entry is on the OVER scale.
    pub fn evaluate(&self, prop: &Prop, context: &C) -> BTreeMap<String, SignalResult> {
        let over_view = prop.as_over();
        let mut breakdown = BTreeMap::new();

        for (scorer, weight) in &self.entries {
            let Some(opinion) = scorer.score(&over_view, context) else {
                debug!("{}: {} has no opinion", prop.label(), scorer.name());
                continue;
            };
            let raw_score = match opinion.direction {
                Some(Direction::Under) => 100.0 - opinion.score,
                _ => opinion.score,
            };
            breakdown.insert(
                scorer.name().to_string(),
                SignalResult {
                    raw_score,
                    weight: *weight,
                    rationale: opinion.rationale,
                },
            );
        }

        breakdown
    }
}

// ── Recorded opinions ─────────────────────────────────────────────────

/// Opinions captured upstream, keyed by prop identity then signal name.
pub type RecordedSignals = HashMap<PropKey, BTreeMap<String, SignalOpinion>>;

/// Replays a recorded opinion for one signal name.
///
/// Used when the heuristics ran elsewhere and their output arrives with the
/// prop records.
#[derive(Debug, Clone)]
pub struct RecordedScorer {
    name: String,
}

impl RecordedScorer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Scorer<RecordedSignals> for RecordedScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, prop: &Prop, context: &RecordedSignals) -> Option<SignalOpinion> {
        context
            .get(&prop.key())
            .and_then(|signals| signals.get(&self.name))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer {
        name: &'static str,
        score: Option<f64>,
        direction: Option<Direction>,
    }

    impl Scorer<()> for FixedScorer {
        fn name(&self) -> &str {
            self.name
        }

        fn score(&self, prop: &Prop, _context: &()) -> Option<SignalOpinion> {
            assert_eq!(prop.direction, Direction::Over, "scorers see the OVER view");
            self.score.map(|score| SignalOpinion {
                score,
                direction: self.direction,
                rationale: vec![format!("{} fixed", self.name)],
            })
        }
    }

    fn make_prop(direction: Direction) -> Prop {
        Prop {
            player: "Derrick Henry".into(),
            team: "BAL".into(),
            opponent: "CIN".into(),
            position: "RB".into(),
            stat_type: "Rushing Yards".into(),
            line: 88.5,
            direction,
        }
    }

    fn fixed(name: &'static str, score: Option<f64>, direction: Option<Direction>) -> Arc<dyn Scorer<()>> {
        Arc::new(FixedScorer {
            name,
            score,
            direction,
        })
    }

    #[test]
    fn test_registry_collects_weighted_results() {
        let mut registry = ScorerRegistry::new();
        registry.register(fixed("DVOA", Some(72.0), None), 1.5).unwrap();
        registry.register(fixed("Weather", None, None), 0.5).unwrap();
        registry
            .register(fixed("Matchup", Some(70.0), Some(Direction::Under)), 1.2)
            .unwrap();

        let breakdown = registry.evaluate(&make_prop(Direction::Under), &());
        assert_eq!(breakdown.len(), 2, "no-opinion scorer is skipped");
        assert_eq!(breakdown["DVOA"].raw_score, 72.0);
        assert_eq!(breakdown["DVOA"].weight, 1.5);
        assert_eq!(breakdown["Matchup"].raw_score, 30.0);
    }

    #[test]
    fn test_duplicate_and_negative_weights_rejected() {
        let mut registry = ScorerRegistry::new();
        registry.register(fixed("DVOA", Some(60.0), None), 1.0).unwrap();
        assert!(registry.register(fixed("DVOA", Some(60.0), None), 1.0).is_err());
        assert!(registry.register(fixed("Volume", Some(60.0), None), -1.0).is_err());
        assert_eq!(registry.names(), vec!["DVOA"]);
    }

    #[test]
    fn test_recorded_scorer_matches_either_side() {
        let under = make_prop(Direction::Under);
        let mut context = RecordedSignals::new();
        context.entry(under.key()).or_default().insert(
            "Volume".into(),
            SignalOpinion {
                score: 64.0,
                direction: None,
                rationale: vec![],
            },
        );

        let scorer = RecordedScorer::new("Volume");
        assert_eq!(scorer.score(&under.as_over(), &context).unwrap().score, 64.0);
        assert!(RecordedScorer::new("DVOA").score(&under, &context).is_none());
    }
}
