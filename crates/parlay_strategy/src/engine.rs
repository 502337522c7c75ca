//! Confidence engine: scorer registry plus aggregator.

use common::{ConfidenceResult, Error, Prop};
use tracing::{debug, warn};

use crate::aggregator::ConfidenceAggregator;
use crate::scoring::ScorerRegistry;

/// Scores props end to end against a context `C`.
pub struct ConfidenceEngine<C: ?Sized> {
    registry: ScorerRegistry<C>,
    aggregator: ConfidenceAggregator,
}

impl<C: ?Sized> ConfidenceEngine<C> {
    pub fn new(registry: ScorerRegistry<C>, aggregator: ConfidenceAggregator) -> Self {
        Self {
            registry,
            aggregator,
        }
    }

    pub fn registry(&self) -> &ScorerRegistry<C> {
        &self.registry
    }

    /// Run every scorer on the OVER view, then aggregate for the prop's side.
    pub fn evaluate(&self, prop: &Prop, context: &C) -> Result<ConfidenceResult, Error> {
        let breakdown = self.registry.evaluate(prop, context);
        self.aggregator.evaluate(prop.clone(), breakdown)
    }

    /// Score a whole slate, strongest first.
    ///
    /// Props that fail aggregation are logged and left out. The sort is
    /// stable so equal confidences keep input order.
    pub fn score_pool(&self, props: &[Prop], context: &C) -> Vec<ConfidenceResult> {
        let mut results: Vec<ConfidenceResult> = props
            .iter()
            .filter_map(|prop| match self.evaluate(prop, context) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Skipping {}: {}", prop.label(), e);
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.final_confidence.cmp(&a.final_confidence));
        debug!("Scored {}/{} props", results.len(), props.len());
        results
    }
}
