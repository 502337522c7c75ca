//! Confidence aggregation and correlation-aware parlay construction.
//!
//! Scorers → [`ConfidenceEngine`] → ranked pool → [`ParlayPlanner`] →
//! standard [`ParlayBuilder`] or [`ParlayOptimizer`] → [`ExposureAnalyzer`].

pub mod aggregator;
pub mod builder;
pub mod correlation;
pub mod engine;
pub mod exposure;
pub mod ledger;
pub mod optimizer;
pub mod parlay;
pub mod planner;
pub mod scoring;

pub use aggregator::{driving_signals, AggregationTrace, ConfidenceAggregator};
pub use builder::ParlayBuilder;
pub use correlation::{CorrelationAnalyzer, CorrelationMatrix, CorrelationReport, PairPenalty};
pub use engine::ConfidenceEngine;
pub use exposure::{ExposureAnalyzer, ExposureRisk, OverExposure, PortfolioExposureReport};
pub use ledger::AllocationLedger;
pub use optimizer::ParlayOptimizer;
pub use parlay::{GameStructure, ParlayCandidate, RiskLevel};
pub use planner::{ParlayBatch, ParlayPlanner};
pub use scoring::{RecordedScorer, RecordedSignals, Scorer, ScorerRegistry};
