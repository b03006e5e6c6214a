use crate::config::estimator::CrowdConfig;
use crate::domain::model::{CrowdInsights, Hour, UnifiedVenueRecord};

/// Peak hours and the quietest hour to drop by, read off the hourly histogram.
pub fn crowd_insights(venue: &UnifiedVenueRecord, config: &CrowdConfig) -> CrowdInsights {
    let peak_hours: Vec<Hour> = venue
        .popular_hours
        .iter()
        .filter(|(_, busy)| **busy > config.peak_threshold)
        .map(|(hour, _)| *hour)
        .collect();

    // opening window wraps past midnight, e.g. 10:00 -> 02:00
    let mut best: Option<(Hour, f64)> = None;
    for offset in 0..config.open_hours {
        let hour = ((u16::from(config.opening_hour) + u16::from(offset)) % 24) as Hour;
        if let Some(&busy) = venue.popular_hours.get(&hour) {
            if best.map_or(true, |(_, lowest)| busy < lowest) {
                best = Some((hour, busy));
            }
        }
    }

    CrowdInsights {
        peak_hours,
        best_time_to_visit: best.map(|(hour, _)| format!("{:02}:00", hour)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RawVenueRecord;

    fn venue(hours: &[(Hour, f64)]) -> UnifiedVenueRecord {
        let mut raw = RawVenueRecord::new("populartimes", "p1", "Bar");
        raw.popular_hours = hours.iter().copied().collect();
        UnifiedVenueRecord::from(&raw)
    }

    #[test]
    fn test_peak_hours_above_threshold() {
        let insights = crowd_insights(
            &venue(&[(18, 40.0), (21, 85.0), (20, 71.0), (22, 70.0)]),
            &CrowdConfig::default(),
        );
        assert_eq!(insights.peak_hours, vec![20, 21]);
    }

    #[test]
    fn test_best_time_wraps_past_midnight() {
        let insights = crowd_insights(
            &venue(&[(9, 0.0), (12, 30.0), (23, 60.0), (1, 10.0), (3, 0.0)]),
            &CrowdConfig::default(),
        );
        // 09:00 and 03:00 fall outside 10:00-02:00
        assert_eq!(insights.best_time_to_visit.as_deref(), Some("01:00"));
    }

    #[test]
    fn test_first_hour_wins_ties() {
        let insights = crowd_insights(&venue(&[(15, 20.0), (11, 20.0)]), &CrowdConfig::default());
        assert_eq!(insights.best_time_to_visit.as_deref(), Some("11:00"));
    }

    #[test]
    fn test_empty_histogram() {
        let insights = crowd_insights(&venue(&[]), &CrowdConfig::default());
        assert!(insights.peak_hours.is_empty());
        assert_eq!(insights.best_time_to_visit, None);
    }
}
