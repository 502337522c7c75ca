//! Batch planning across all leg-size buckets.

use std::collections::{BTreeMap, HashMap};

use common::config::ConstructionMode;
use common::{ConfidenceResult, EngineConfig, Error, PropKey};
use serde::Serialize;
use tracing::{debug, info};

use crate::builder::ParlayBuilder;
use crate::correlation::CorrelationAnalyzer;
use crate::exposure::{ExposureAnalyzer, PortfolioExposureReport};
use crate::ledger::AllocationLedger;
use crate::optimizer::ParlayOptimizer;
use crate::parlay::ParlayCandidate;

pub fn bucket_label(size: usize) -> String {
    format!("{}_leg", size)
}

/// One planner pass: parlays per bucket and what fell short.
#[derive(Debug, Clone, Serialize)]
pub struct ParlayBatch {
    pub buckets: BTreeMap<String, Vec<ParlayCandidate>>,
    /// `requested - produced` per bucket.
    pub shortfalls: BTreeMap<String, usize>,
    /// Props left after filtering and collapsing.
    pub pool_size: usize,
}

impl ParlayBatch {
    /// Every parlay, smallest bucket first.
    pub fn all(&self) -> impl Iterator<Item = &ParlayCandidate> {
        self.buckets.values().flatten()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

pub struct ParlayPlanner {
    config: EngineConfig,
    analyzer: CorrelationAnalyzer,
}

impl ParlayPlanner {
    pub fn new(config: EngineConfig) -> Self {
        let analyzer = CorrelationAnalyzer::new(config.correlation.clone());
        Self { config, analyzer }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Filter, collapse opposite sides and rank strongest first.
    pub fn prepare_pool(&self, results: Vec<ConfidenceResult>) -> Vec<ConfidenceResult> {
        let construction = &self.config.construction;
        let before = results.len();

        let mut pool: Vec<ConfidenceResult> = Vec::with_capacity(before);
        let mut by_key: HashMap<PropKey, usize> = HashMap::new();

        for result in results {
            if result.final_confidence < construction.min_confidence {
                continue;
            }
            if !construction.collapse_opposite_sides {
                pool.push(result);
                continue;
            }
            match by_key.get(&result.prop.key()) {
                Some(&idx) => {
                    if result.final_confidence > pool[idx].final_confidence {
                        debug!(
                            "Collapsing {} in favour of {}",
                            pool[idx].prop.label(),
                            result.prop.label()
                        );
                        pool[idx] = result;
                    }
                }
                None => {
                    by_key.insert(result.prop.key(), pool.len());
                    pool.push(result);
                }
            }
        }

        pool.sort_by(|a, b| b.final_confidence.cmp(&a.final_confidence));
        debug!("Pool: {} of {} props usable", pool.len(), before);
        pool
    }

    /// Per-player parlay cap for one batch.
    pub fn player_cap(&self) -> u32 {
        let construction = &self.config.construction;
        let total_target: usize = construction.targets.entries().iter().map(|(_, t)| t).sum();
        let by_exposure = (construction.max_player_exposure * total_target as f64).floor() as u32;
        construction.max_player_uses.min(by_exposure.max(1))
    }

    /// Build every bucket, 2 legs up to 5, through one shared ledger.
    pub fn build_all(&self, results: Vec<ConfidenceResult>) -> Result<ParlayBatch, Error> {
        let pool = self.prepare_pool(results);
        let construction = &self.config.construction;
        let mut ledger = AllocationLedger::new(self.player_cap(), construction.allow_prop_reuse);

        let mut buckets = BTreeMap::new();
        let mut shortfalls = BTreeMap::new();

        for (size, target) in construction.targets.entries() {
            let label = bucket_label(size);
            let built = if target == 0 {
                Vec::new()
            } else {
                match construction.mode {
                    ConstructionMode::Standard => ParlayBuilder::new(construction, &self.analyzer)
                        .build(size, target, &pool, &mut ledger)?,
                    ConstructionMode::Optimizer => {
                        ParlayOptimizer::new(construction, &self.config.optimizer, &self.analyzer)
                            .build(size, target, &pool, &mut ledger)?
                    }
                }
            };

            let shortfall = target.saturating_sub(built.len());
            if shortfall > 0 {
                debug!("{}: short by {} (pool too thin)", label, shortfall);
            }
            shortfalls.insert(label.clone(), shortfall);
            buckets.insert(label, built);
        }

        let batch = ParlayBatch {
            buckets,
            shortfalls,
            pool_size: pool.len(),
        };
        info!(
            "Planned {} parlays from {} props ({:?} mode, player cap {})",
            batch.total(),
            batch.pool_size,
            construction.mode,
            ledger.max_player_uses()
        );
        Ok(batch)
    }

    /// Exposure report over a built batch, tracking every configured signal.
    pub fn analyze_exposure(&self, batch: &ParlayBatch) -> PortfolioExposureReport {
        ExposureAnalyzer::new(
            self.config.exposure.clone(),
            self.config.signal_weights.keys().cloned(),
        )
        .analyze(batch.all())
    }
}
