//! Affluence (busy-ness) scoring from live and historical popularity proxies.

use crate::config::estimator::AffluenceConfig;
use crate::domain::model::{
    AffluenceComponent, AffluenceScore, ComponentScore, UnifiedVenueRecord,
};

#[derive(Debug, Clone)]
pub struct AffluenceScorer {
    config: AffluenceConfig,
}

fn normalize(count: u64, scale: f64) -> f64 {
    (count as f64 / scale * 100.0).clamp(0.0, 100.0)
}

/// Weighted mean over the components that are present. Weights of absent
/// components drop out of the denominator; nothing present scores 0.
pub fn weighted_score(parts: &[(f64, Option<f64>)]) -> f64 {
    let (weighted, total_weight) = parts
        .iter()
        .filter_map(|(weight, value)| value.map(|v| (*weight, v)))
        .fold((0.0, 0.0), |(sum, total), (weight, value)| {
            (sum + weight * value, total + weight)
        });

    if total_weight <= 0.0 {
        return 0.0;
    }
    (weighted / total_weight).clamp(0.0, 100.0)
}

impl AffluenceScorer {
    pub fn new(config: &AffluenceConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn weight(&self, component: AffluenceComponent) -> f64 {
        let w = &self.config.weights;
        match component {
            AffluenceComponent::CurrentBusy => w.current_busy,
            AffluenceComponent::PeakDensity => w.peak_density,
            AffluenceComponent::ReviewVelocity => w.review_velocity,
            AffluenceComponent::CheckinFrequency => w.checkin_frequency,
        }
    }

    /// Mean of the busiest `peak_top_hours` hours.
    fn peak_density(&self, venue: &UnifiedVenueRecord) -> Option<f64> {
        if venue.popular_hours.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = venue.popular_hours.values().copied().collect();
        values.sort_by(|a, b| b.total_cmp(a));
        values.truncate(self.config.peak_top_hours.max(1));
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    fn component(&self, component: AffluenceComponent, venue: &UnifiedVenueRecord) -> Option<f64> {
        let value = match component {
            AffluenceComponent::CurrentBusy => venue.busy_percent,
            AffluenceComponent::PeakDensity => self.peak_density(venue),
            AffluenceComponent::ReviewVelocity => Some(normalize(
                venue.review_count,
                self.config.review_velocity_scale,
            )),
            AffluenceComponent::CheckinFrequency => venue
                .checkins
                .map(|count| normalize(count, self.config.checkin_scale)),
        };
        value.map(|v| v.clamp(0.0, 100.0))
    }

    pub fn score(&self, venue: &UnifiedVenueRecord) -> AffluenceScore {
        let components: Vec<ComponentScore> = AffluenceComponent::ALL
            .iter()
            .map(|&component| ComponentScore {
                component,
                value: self.component(component, venue),
            })
            .collect();

        let parts: Vec<(f64, Option<f64>)> = components
            .iter()
            .map(|c| (self.weight(c.component), c.value))
            .collect();
        let score = weighted_score(&parts);

        tracing::debug!("{}: affluence {:.1}", venue.venue_key, score);
        AffluenceScore { score, components }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RawVenueRecord;

    fn scorer() -> AffluenceScorer {
        AffluenceScorer::new(&AffluenceConfig::default())
    }

    fn venue() -> RawVenueRecord {
        RawVenueRecord::new("populartimes", "p1", "Bar Busy")
    }

    #[test]
    fn test_missing_checkins_renormalizes_weights() {
        let mut raw = venue();
        raw.busy_percent = Some(80.0);
        raw.popular_hours = [(19, 60.0), (20, 70.0), (21, 65.0), (22, 75.0), (14, 10.0)]
            .into_iter()
            .collect();
        raw.review_count = 500;

        let score = scorer().score(&UnifiedVenueRecord::from(&raw));

        assert_eq!(score.component(AffluenceComponent::PeakDensity), Some(70.0));
        assert_eq!(score.component(AffluenceComponent::ReviewVelocity), Some(100.0));
        assert_eq!(score.component(AffluenceComponent::CheckinFrequency), None);
        // (80*40 + 70*30 + 100*15) / 85
        assert!((score.score - 80.588).abs() < 0.01, "score was {}", score.score);
    }

    #[test]
    fn test_all_components_present() {
        let mut raw = venue();
        raw.busy_percent = Some(50.0);
        raw.popular_hours = [(20, 50.0)].into_iter().collect();
        raw.review_count = 250;
        raw.checkins = Some(500);

        let score = scorer().score(&UnifiedVenueRecord::from(&raw));
        assert!((score.score - 50.0).abs() < 1e-9);
        assert!(score.has_data());
    }

    #[test]
    fn test_no_live_data_still_scores_review_velocity() {
        let mut raw = venue();
        raw.review_count = 0;

        let score = scorer().score(&UnifiedVenueRecord::from(&raw));
        assert_eq!(score.component(AffluenceComponent::ReviewVelocity), Some(0.0));
        assert_eq!(score.score, 0.0);
        assert!(score.has_data());
    }

    #[test]
    fn test_velocity_saturates_at_100() {
        let mut raw = venue();
        raw.review_count = 10_000;
        raw.checkins = Some(1_000_000);

        let score = scorer().score(&UnifiedVenueRecord::from(&raw));
        assert_eq!(score.component(AffluenceComponent::ReviewVelocity), Some(100.0));
        assert_eq!(score.component(AffluenceComponent::CheckinFrequency), Some(100.0));
        assert_eq!(score.score, 100.0);
    }

    #[test]
    fn test_all_components_absent_scores_zero() {
        // a present component with zero weight contributes nothing
        let parts = [(40.0, None), (30.0, None), (0.0, Some(55.0)), (15.0, None)];
        assert_eq!(weighted_score(&parts), 0.0);

        assert_eq!(weighted_score(&[(40.0, None), (30.0, None)]), 0.0);
        assert_eq!(weighted_score(&[]), 0.0);
    }

    #[test]
    fn test_score_stays_in_range_for_every_subset() {
        let values = [Some(100.0), Some(0.0), Some(37.5), None];
        let weights = [40.0, 30.0, 15.0, 15.0];

        for a in values {
            for b in values {
                for c in values {
                    for d in values {
                        let parts = [(weights[0], a), (weights[1], b), (weights[2], c), (weights[3], d)];
                        let score = weighted_score(&parts);
                        assert!((0.0..=100.0).contains(&score), "{:?} -> {}", parts, score);
                    }
                }
            }
        }
    }

    #[test]
    fn test_fewer_hours_than_top_n() {
        let mut raw = venue();
        raw.popular_hours = [(21, 40.0), (22, 80.0)].into_iter().collect();
        let score = scorer().score(&UnifiedVenueRecord::from(&raw));
        assert_eq!(score.component(AffluenceComponent::PeakDensity), Some(60.0));
    }
}
