//! Capacity estimation: fuse text hints, category baseline, price level and
//! review volume into one head count with a confidence label.

use crate::config::estimator::{CapacityConfig, EstimatorConfig};
use crate::core::baseline::{CategoryBaselineTable, DEFAULT_CATEGORY};
use crate::core::extractor::TextSignalExtractor;
use crate::domain::model::{
    CapacityEstimate, CapacitySignal, Confidence, EvidenceTier, UnifiedVenueRecord,
};
use crate::domain::ports::CapacitySignalSource;
use crate::utils::error::Result;
use std::sync::Arc;

pub struct CapacityEstimator {
    extractor: TextSignalExtractor,
    baselines: CategoryBaselineTable,
    config: CapacityConfig,
    sources: Vec<Arc<dyn CapacitySignalSource>>,
}

impl CapacityEstimator {
    pub fn new(config: &EstimatorConfig) -> Result<Self> {
        Ok(Self {
            extractor: TextSignalExtractor::new(&config.text)?,
            baselines: CategoryBaselineTable::new(&config.capacity),
            config: config.capacity.clone(),
            sources: Vec::new(),
        })
    }

    /// Registers an extra evidence source consulted for every venue.
    pub fn with_source(mut self, source: Arc<dyn CapacitySignalSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Review hints, then external sources, then the category baseline.
    pub fn collect_signals(&self, venue: &UnifiedVenueRecord) -> Vec<CapacitySignal> {
        let mut signals = self.extractor.extract(&venue.reviews);
        for source in &self.sources {
            let extra = source.signals(venue);
            tracing::debug!(
                "{}: {} signal(s) from {}",
                venue.venue_key,
                extra.len(),
                source.name()
            );
            signals.extend(extra);
        }
        let tags: Vec<&str> = venue.categories.iter().map(String::as_str).collect();
        signals.push(self.baselines.baseline(&tags));
        signals
    }

    pub fn estimate(&self, venue: &UnifiedVenueRecord) -> CapacityEstimate {
        let signals = self.collect_signals(venue);
        let estimate = fuse(&signals, venue.price_level, venue.review_count, &self.config);
        tracing::debug!(
            "{}: capacity {} ({}) via {}",
            venue.venue_key,
            estimate.capacity,
            estimate.confidence,
            estimate.methodology
        );
        estimate
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// Reduces a bag of signals to a single estimate.
///
/// The strongest tier present decides the raw value: the median of explicit
/// mentions, else the mean of descriptive hints (keywords, photo estimates),
/// else the category baseline. Price and review volume then adjust it. The
/// returned `signals` trace lists the contributing evidence and the price
/// adjustment; the review volume uplift shows up in `methodology` only.
pub fn fuse(
    signals: &[CapacitySignal],
    price_level: Option<u8>,
    review_count: u64,
    config: &CapacityConfig,
) -> CapacityEstimate {
    let in_tier = |tier: EvidenceTier| -> Vec<&CapacitySignal> {
        signals.iter().filter(|s| s.tier() == tier).collect()
    };
    let explicit = in_tier(EvidenceTier::Explicit);
    let descriptive = in_tier(EvidenceTier::Descriptive);
    let baseline = in_tier(EvidenceTier::Baseline);

    let fallback = CapacitySignal::CategoryBaseline {
        category: DEFAULT_CATEGORY.to_string(),
        value: config.default_baseline,
    };

    let (contributing, confidence, mut methodology): (Vec<&CapacitySignal>, Confidence, String) =
        if !explicit.is_empty() {
            let rule = format!("median of {}", plural(explicit.len(), "explicit mention"));
            (explicit, Confidence::High, rule)
        } else if !descriptive.is_empty() {
            let rule = format!("mean of {}", plural(descriptive.len(), "size hint"));
            (descriptive, Confidence::Medium, rule)
        } else {
            let chosen = baseline.into_iter().next().unwrap_or(&fallback);
            (vec![chosen], Confidence::Low, "category baseline".to_string())
        };

    let values: Vec<f64> = contributing.iter().filter_map(|s| s.value()).collect();
    let raw = match confidence {
        Confidence::High => median(&values),
        Confidence::Medium => mean(&values),
        Confidence::Low => values.first().copied().unwrap_or(f64::from(config.default_baseline)),
    };

    let mut trace: Vec<String> = contributing.iter().map(|s| s.to_string()).collect();

    let price_delta = price_level
        .map(|p| f64::from(p) * config.price_multiplier)
        .unwrap_or(0.0);
    let mut adjusted = raw + price_delta;
    trace.push(CapacitySignal::PriceAdjustment { delta: price_delta }.to_string());
    if price_level.is_some() {
        methodology.push_str(" + price level adjustment");
    }

    if review_count > config.review_volume_threshold {
        let uplift = (adjusted * (config.review_volume_factor - 1.0))
            .min(raw * config.review_volume_cap)
            .max(0.0);
        if uplift > 0.0 {
            // named in the methodology only; the trace stays evidence + price
            adjusted += uplift;
            methodology.push_str(" + review volume uplift");
        }
    }

    let capacity = adjusted.round().max(1.0) as u32;

    CapacityEstimate {
        capacity,
        confidence,
        signals: trace,
        methodology,
    }
}
