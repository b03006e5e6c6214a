use std::sync::Arc;
use venue_insight::core::CapacitySignalSource;
use venue_insight::{
    CapacitySignal, Confidence, EstimatorConfig, RawVenueRecord, UnifiedVenueRecord, VenueAnalyzer,
};

/// Stands in for an image-analysis service that counts seats in photos.
struct PhotoCounter {
    seats: u32,
}

impl CapacitySignalSource for PhotoCounter {
    fn name(&self) -> &str {
        "photo-counter"
    }

    fn signals(&self, _venue: &UnifiedVenueRecord) -> Vec<CapacitySignal> {
        vec![CapacitySignal::PhotoEstimate { value: self.seats }]
    }
}

fn bar(reviews: &[&str]) -> RawVenueRecord {
    let mut raw = RawVenueRecord::new("google", "g-1", "Corner Bar");
    raw.categories = vec!["cocktail_bar".to_string()];
    raw.reviews = reviews.iter().map(|r| r.to_string()).collect();
    raw
}

#[test]
fn test_photo_estimate_joins_descriptive_hints() {
    let analyzer = VenueAnalyzer::new(&EstimatorConfig::default())
        .unwrap()
        .with_signal_source(Arc::new(PhotoCounter { seats: 50 }));

    let scored = analyzer.analyze(&[bar(&["a small room"])]).unwrap();

    // mean(25, 50)
    assert_eq!(scored.capacity.capacity, 38);
    assert_eq!(scored.capacity.confidence, Confidence::Medium);
    assert_eq!(
        scored.capacity.signals,
        vec!["keyword:small=25", "photo_estimate=50", "price_adjustment=+0"]
    );
}

#[test]
fn test_explicit_mention_outranks_photo_estimate() {
    let analyzer = VenueAnalyzer::new(&EstimatorConfig::default())
        .unwrap()
        .with_signal_source(Arc::new(PhotoCounter { seats: 200 }));

    let scored = analyzer
        .analyze(&[bar(&["seats 30 at the counter", "we were 12 guests"])])
        .unwrap();

    // median(30, 12)
    assert_eq!(scored.capacity.capacity, 21);
    assert_eq!(scored.capacity.confidence, Confidence::High);
}

#[test]
fn test_without_sources_falls_back_to_category() {
    let analyzer = VenueAnalyzer::new(&EstimatorConfig::default()).unwrap();
    let scored = analyzer.analyze(&[bar(&[])]).unwrap();

    assert_eq!(scored.capacity.capacity, 35);
    assert_eq!(scored.capacity.confidence, Confidence::Low);
    assert_eq!(
        scored.capacity.signals,
        vec!["category_baseline:cocktail_bar=35", "price_adjustment=+0"]
    );
}
