//! Domain types shared across the engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

// ── Props ─────────────────────────────────────────────────────────────

/// Which side of the line a prop is priced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[serde(alias = "over", alias = "Over")]
    Over,
    #[serde(alias = "under", alias = "Under")]
    Under,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Over => "OVER",
            Direction::Under => "UNDER",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "over" | "o" | "more" | "higher" => Ok(Direction::Over),
            "under" | "u" | "less" | "lower" => Ok(Direction::Under),
            other => Err(Error::MalformedProp {
                field: "direction",
                reason: format!("unrecognised direction '{}'", other),
            }),
        }
    }
}

/// A single bettable proposition on a player statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub player: String,
    pub team: String,
    pub opponent: String,
    pub position: String,
    pub stat_type: String,
    pub line: f64,
    pub direction: Direction,
}

impl Prop {
    /// Identity ignoring direction, used for "same prop, other side" checks.
    pub fn key(&self) -> PropKey {
        PropKey {
            player: self.player.clone(),
            stat_type: self.stat_type.clone(),
            line_milli: (self.line * 1000.0).round() as i64,
            team: self.team.clone(),
            opponent: self.opponent.clone(),
        }
    }

    /// Direction-qualified identity, the unit of allocation.
    pub fn id(&self) -> PropId {
        PropId {
            key: self.key(),
            direction: self.direction,
        }
    }

    pub fn game(&self) -> GameKey {
        GameKey::new(&self.team, &self.opponent)
    }

    /// The same prop re-cast as an OVER bet.
    ///
    /// Scorers are always run against this view so one canonical signal
    /// evaluation backs both sides of the line.
    pub fn as_over(&self) -> Prop {
        Prop {
            direction: Direction::Over,
            ..self.clone()
        }
    }

    /// Short human-readable label, e.g. `J. Allen OVER 245.5 Passing Yards`.
    pub fn label(&self) -> String {
        format!(
            "{} {} {} {}",
            self.player, self.direction, self.line, self.stat_type
        )
    }
}

/// Prop identity without direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropKey {
    pub player: String,
    pub stat_type: String,
    /// Line scaled by 1000 so the key can be hashed and ordered.
    pub line_milli: i64,
    pub team: String,
    pub opponent: String,
}

/// Direction-qualified prop identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropId {
    pub key: PropKey,
    pub direction: Direction,
}

/// Unordered `{team, opponent}` pair identifying one game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameKey {
    pub first: String,
    pub second: String,
}

impl GameKey {
    pub fn new(team: &str, opponent: &str) -> Self {
        let a = team.trim().to_ascii_uppercase();
        let b = opponent.trim().to_ascii_uppercase();
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }
}

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.first, self.second)
    }
}

// ── Boundary records ──────────────────────────────────────────────────

/// A prop record as delivered by the data-loading collaborator.
///
/// Every field is optional on the wire; [`RawPropRecord::to_prop`] is the
/// single validation point before a record enters aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPropRecord {
    #[serde(default, alias = "player")]
    pub player_name: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub stat_type: Option<String>,
    #[serde(default)]
    pub line: Option<f64>,
    #[serde(default)]
    pub direction: Option<String>,
    /// Legacy spelling of `direction` used by some loaders.
    #[serde(default)]
    pub bet_type: Option<String>,
    /// Recorded scorer opinions keyed by signal name.
    #[serde(default)]
    pub signals: BTreeMap<String, SignalOpinion>,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, Error> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::MalformedProp {
            field,
            reason: "missing or blank".into(),
        }),
    }
}

impl RawPropRecord {
    /// Validate and convert into an immutable [`Prop`].
    pub fn to_prop(&self) -> Result<Prop, Error> {
        let player = required(&self.player_name, "player_name")?;
        let team = required(&self.team, "team")?;
        let opponent = required(&self.opponent, "opponent")?;
        let position = required(&self.position, "position")?;
        let stat_type = required(&self.stat_type, "stat_type")?;

        let line = match self.line {
            Some(l) if l.is_finite() => l,
            Some(l) => {
                return Err(Error::MalformedProp {
                    field: "line",
                    reason: format!("non-finite line {}", l),
                })
            }
            None => {
                return Err(Error::MalformedProp {
                    field: "line",
                    reason: "missing".into(),
                })
            }
        };

        let raw_direction = self
            .direction
            .as_deref()
            .or(self.bet_type.as_deref())
            .ok_or_else(|| Error::MalformedProp {
                field: "direction",
                reason: "missing (neither direction nor bet_type set)".into(),
            })?;
        let direction = raw_direction.parse::<Direction>()?;

        Ok(Prop {
            player,
            team,
            opponent,
            position: position.to_ascii_uppercase(),
            stat_type,
            line,
            direction,
        })
    }
}

// ── Signals ───────────────────────────────────────────────────────────

/// What a scorer says about one prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOpinion {
    /// Score in [0, 100]; 50 is neutral.
    pub score: f64,
    /// Side the scorer leans towards, if it reports one.
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub rationale: Vec<String>,
}

/// One scorer's contribution to a prop, with its configured weight attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub raw_score: f64,
    pub weight: f64,
    #[serde(default)]
    pub rationale: Vec<String>,
}

impl SignalResult {
    pub fn new(raw_score: f64, weight: f64) -> Self {
        Self {
            raw_score,
            weight,
            rationale: Vec::new(),
        }
    }

    /// Reject scores outside [0, 100] and negative or non-finite weights.
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        if !self.raw_score.is_finite() || !(0.0..=100.0).contains(&self.raw_score) {
            return Err(Error::InvalidSignal {
                name: name.to_string(),
                reason: format!("raw_score {} outside [0,100]", self.raw_score),
            });
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(Error::InvalidSignal {
                name: name.to_string(),
                reason: format!("weight {} must be finite and >= 0", self.weight),
            });
        }
        Ok(())
    }
}

/// A signal's share of a prop's conviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivingSignal {
    pub name: String,
    /// Fraction of total weighted deviation from neutral, in [0, 1].
    pub contribution: f64,
}

/// Aggregated, calibrated confidence for one prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub prop: Prop,
    /// Confidence for the side the prop is priced on, in [0, 100].
    pub final_confidence: u8,
    /// Emitted OVER-perspective confidence; `final_confidence` is either this
    /// or `100 - over_confidence`.
    pub over_confidence: u8,
    pub signal_breakdown: BTreeMap<String, SignalResult>,
    /// Ordered by contribution, strongest first.
    pub driving_signals: Vec<DrivingSignal>,
}

impl ConfidenceResult {
    /// Names of the `n` strongest driving signals.
    pub fn top_drivers(&self, n: usize) -> Vec<&str> {
        self.driving_signals
            .iter()
            .take(n)
            .map(|d| d.name.as_str())
            .collect()
    }
}
