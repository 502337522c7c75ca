//! Batch-level signal exposure.
//!
//! A batch of individually sound parlays can still be one bet on a single
//! signal. This module measures how often each signal materially drives a
//! parlay and flags the ones the batch leans on too hard.

use std::collections::{BTreeMap, BTreeSet};

use common::config::ExposureConfig;
use serde::Serialize;
use tracing::{debug, warn};

use crate::parlay::ParlayCandidate;

/// Guards the ceiling in `parlays_to_remove` against float noise.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExposureRisk {
    Low,
    Moderate,
    Elevated,
    High,
    Critical,
}

/// An over-exposed signal and how far to pull it back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverExposure {
    pub signal: String,
    pub exposure: f64,
    /// Exposure to reduce to.
    pub reduction_target: f64,
    pub parlays_to_remove: usize,
    /// Under-utilized signals that could carry the replacement parlays.
    pub substitutes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioExposureReport {
    pub total_parlays: usize,
    /// Fraction of parlays each signal drives.
    pub exposures: BTreeMap<String, f64>,
    pub parlay_counts: BTreeMap<String, usize>,
    /// Herfindahl index over `exposures`.
    pub concentration: f64,
    pub risk: ExposureRisk,
    pub over_exposed_agents: Vec<OverExposure>,
    pub under_utilized_agents: Vec<String>,
    /// Parlays (batch order) suggested for rebuild, ascending.
    pub rebuild_indices: Vec<usize>,
    pub needs_rebuild: bool,
}

impl PortfolioExposureReport {
    fn empty() -> Self {
        Self {
            total_parlays: 0,
            exposures: BTreeMap::new(),
            parlay_counts: BTreeMap::new(),
            concentration: 0.0,
            risk: ExposureRisk::Low,
            over_exposed_agents: Vec::new(),
            under_utilized_agents: Vec::new(),
            rebuild_indices: Vec::new(),
            needs_rebuild: false,
        }
    }

    pub fn exposure(&self, signal: &str) -> f64 {
        self.exposures.get(signal).copied().unwrap_or(0.0)
    }

    pub fn is_over_exposed(&self, signal: &str) -> bool {
        self.over_exposed_agents.iter().any(|o| o.signal == signal)
    }
}

pub struct ExposureAnalyzer {
    config: ExposureConfig,
    known_signals: BTreeSet<String>,
}

impl ExposureAnalyzer {
    /// `known_signals` are reported even when they drive nothing.
    pub fn new(config: ExposureConfig, known_signals: impl IntoIterator<Item = String>) -> Self {
        Self {
            config,
            known_signals: known_signals.into_iter().collect(),
        }
    }

    /// Signals that materially drive `parlay`.
    pub fn drivers_of(&self, parlay: &ParlayCandidate) -> BTreeSet<String> {
        parlay
            .legs
            .iter()
            .flat_map(|leg| leg.driving_signals.iter().take(self.config.drivers_per_leg))
            .filter(|d| d.contribution >= self.config.materiality)
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn analyze<'a, I>(&self, parlays: I) -> PortfolioExposureReport
    where
        I: IntoIterator<Item = &'a ParlayCandidate>,
    {
        let parlays: Vec<&ParlayCandidate> = parlays.into_iter().collect();
        let total = parlays.len();
        if total == 0 {
            return PortfolioExposureReport::empty();
        }

        let drivers: Vec<BTreeSet<String>> = parlays.iter().map(|p| self.drivers_of(p)).collect();

        let mut counts: BTreeMap<String, usize> = self
            .known_signals
            .iter()
            .map(|s| (s.clone(), 0))
            .collect();
        for set in &drivers {
            for name in set {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        }

        let exposures: BTreeMap<String, f64> = counts
            .iter()
            .map(|(name, count)| (name.clone(), *count as f64 / total as f64))
            .collect();
        let concentration: f64 = exposures.values().map(|e| e * e).sum();
        let risk = self.classify(&exposures);

        let mut under_utilized: Vec<(&String, f64)> = exposures
            .iter()
            .filter(|(_, e)| **e <= self.config.under_utilized)
            .map(|(name, e)| (name, *e))
            .collect();
        under_utilized.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        let under_utilized_agents: Vec<String> =
            under_utilized.into_iter().map(|(name, _)| name.clone()).collect();

        let mut over: Vec<(&String, f64)> = exposures
            .iter()
            .filter(|(_, e)| **e > self.config.cap)
            .map(|(name, e)| (name, *e))
            .collect();
        over.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut rebuild = BTreeSet::new();
        let over_exposed_agents: Vec<OverExposure> = over
            .into_iter()
            .map(|(signal, exposure)| {
                let excess = (exposure - self.config.target) * total as f64;
                let parlays_to_remove = (excess - EPSILON).ceil().max(0.0) as usize;

                let mut driven: Vec<usize> = (0..total).filter(|i| drivers[*i].contains(signal)).collect();
                driven.sort_by_key(|i| (parlays[*i].combined_confidence, *i));
                rebuild.extend(driven.into_iter().take(parlays_to_remove));

                warn!(
                    "{} drives {:.0}% of parlays (cap {:.0}%), remove {}",
                    signal,
                    exposure * 100.0,
                    self.config.cap * 100.0,
                    parlays_to_remove
                );
                OverExposure {
                    signal: signal.clone(),
                    exposure,
                    reduction_target: self.config.target,
                    parlays_to_remove,
                    substitutes: under_utilized_agents.clone(),
                }
            })
            .collect();

        debug!(
            "Exposure over {} parlays: HHI={:.3} risk={:?}",
            total, concentration, risk
        );

        let rebuild_indices: Vec<usize> = rebuild.into_iter().collect();
        PortfolioExposureReport {
            total_parlays: total,
            exposures,
            parlay_counts: counts,
            concentration,
            risk,
            needs_rebuild: !rebuild_indices.is_empty(),
            over_exposed_agents,
            under_utilized_agents,
            rebuild_indices,
        }
    }

    fn classify(&self, exposures: &BTreeMap<String, f64>) -> ExposureRisk {
        let top = exposures.values().copied().fold(0.0_f64, f64::max);
        let watched = exposures
            .values()
            .filter(|e| **e >= self.config.watch_exposure)
            .count();

        if top > self.config.critical_exposure {
            ExposureRisk::Critical
        } else if top > self.config.high_exposure {
            ExposureRisk::High
        } else if watched >= 2 {
            ExposureRisk::Elevated
        } else if top >= self.config.watch_exposure {
            ExposureRisk::Moderate
        } else {
            ExposureRisk::Low
        }
    }
}
