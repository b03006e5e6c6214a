use crate::config::estimator::{CrowdConfig, EstimatorConfig};
use crate::core::affluence::AffluenceScorer;
use crate::core::capacity::CapacityEstimator;
use crate::core::crowd::crowd_insights;
use crate::core::merger::VenueMerger;
use crate::domain::model::{RawVenueRecord, ScoredVenue};
use crate::domain::ports::CapacitySignalSource;
use crate::utils::error::Result;
use std::sync::Arc;

/// Merge, estimate and score one venue group. Holds no mutable state, so a
/// single instance is shared by every worker.
pub struct VenueAnalyzer {
    merger: VenueMerger,
    capacity: CapacityEstimator,
    affluence: AffluenceScorer,
    crowd: CrowdConfig,
}

impl VenueAnalyzer {
    pub fn new(config: &EstimatorConfig) -> Result<Self> {
        Ok(Self {
            merger: VenueMerger::new(&config.merge),
            capacity: CapacityEstimator::new(config)?,
            affluence: AffluenceScorer::new(&config.affluence),
            crowd: config.crowd.clone(),
        })
    }

    pub fn with_signal_source(mut self, source: Arc<dyn CapacitySignalSource>) -> Self {
        self.capacity = self.capacity.with_source(source);
        self
    }

    pub fn analyze(&self, group: &[RawVenueRecord]) -> Result<ScoredVenue> {
        let venue = self.merger.merge(group)?;

        // capacity and affluence read the same immutable record independently
        let capacity = self.capacity.estimate(&venue);
        let affluence = self.affluence.score(&venue);
        let crowd = crowd_insights(&venue, &self.crowd);

        Ok(ScoredVenue {
            venue,
            capacity,
            affluence,
            crowd,
        })
    }
}
