//! Tunable tables and constants consumed by the estimators.
//!
//! Every value here is empirically chosen, so all of it can be overridden
//! from the `[estimator]` section of the TOML config. Missing keys fall back
//! to the defaults below.

use crate::domain::model::Hour;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_non_negative_f64, validate_positive_f64,
    validate_positive_number, validate_range, Validate,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub text: TextSignalConfig,
    pub capacity: CapacityConfig,
    pub affluence: AffluenceConfig,
    pub merge: MergeConfig,
    pub crowd: CrowdConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordValue {
    pub keyword: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryValue {
    pub category: String,
    pub value: u32,
}

fn keyword(keyword: &str, value: u32) -> KeywordValue {
    KeywordValue {
        keyword: keyword.to_string(),
        value,
    }
}

fn category(category: &str, value: u32) -> CategoryValue {
    CategoryValue {
        category: category.to_string(),
        value,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSignalConfig {
    /// Nouns that turn a preceding number into a head count ("40 people").
    pub capacity_nouns: Vec<String>,
    /// Verbs that turn a following number into a head count ("fits 40").
    pub capacity_verbs: Vec<String>,
    /// Words allowed between the number and the noun/verb.
    pub mention_window: usize,
    pub min_explicit: u32,
    pub max_explicit: u32,
    /// Size descriptors, searched in this order.
    pub keywords: Vec<KeywordValue>,
}

impl Default for TextSignalConfig {
    fn default() -> Self {
        Self {
            capacity_nouns: ["seats", "seat", "people", "persons", "person", "guests", "guest", "pax", "capacity"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            capacity_verbs: ["fits", "fit", "holds", "hold", "seats", "capacity of", "capacity for"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mention_window: 2,
            min_explicit: 5,
            max_explicit: 500,
            keywords: vec![
                keyword("tiny", 15),
                keyword("very small", 15),
                keyword("cramped", 20),
                keyword("small", 25),
                keyword("cozy", 30),
                keyword("intimate", 30),
                keyword("medium", 45),
                keyword("moderate", 45),
                keyword("average", 45),
                keyword("large", 70),
                keyword("spacious", 75),
                keyword("big", 75),
                keyword("huge", 120),
                keyword("massive", 150),
                keyword("enormous", 200),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Category baselines in priority order; the first tag a venue carries wins.
    pub categories: Vec<CategoryValue>,
    pub default_baseline: u32,
    /// Added per price level step.
    pub price_multiplier: f64,
    pub review_volume_threshold: u64,
    pub review_volume_factor: f64,
    /// Upper bound of the uplift as a fraction of the unadjusted estimate.
    pub review_volume_cap: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                category("night_club", 150),
                category("pub", 60),
                category("cocktail_bar", 35),
                category("wine_bar", 25),
                category("sports_bar", 80),
                category("beer_bar", 50),
                category("hotel_bar", 50),
                category("rooftop_bar", 45),
                category("lounge", 40),
                category("tapas_bar", 35),
                category("dive_bar", 30),
                category("speakeasy", 25),
                // generic Google type, sized like a cocktail bar
                category("bar", 35),
            ],
            default_baseline: 40,
            price_multiplier: 10.0,
            review_volume_threshold: 200,
            review_volume_factor: 1.1,
            review_volume_cap: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffluenceWeights {
    pub current_busy: f64,
    pub peak_density: f64,
    pub review_velocity: f64,
    pub checkin_frequency: f64,
}

impl Default for AffluenceWeights {
    fn default() -> Self {
        Self {
            current_busy: 40.0,
            peak_density: 30.0,
            review_velocity: 15.0,
            checkin_frequency: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffluenceConfig {
    pub weights: AffluenceWeights,
    /// Number of busiest hours averaged into the peak density.
    pub peak_top_hours: usize,
    /// Review count that maps to a velocity of 100.
    pub review_velocity_scale: f64,
    /// Check-in count that maps to a frequency of 100.
    pub checkin_scale: f64,
}

impl Default for AffluenceConfig {
    fn default() -> Self {
        Self {
            weights: AffluenceWeights::default(),
            peak_top_hours: 3,
            review_velocity_scale: 500.0,
            checkin_scale: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Most trusted provider first. Unknown providers rank after all listed ones.
    pub provider_trust: Vec<String>,
    pub location_tolerance_m: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            provider_trust: vec!["google".to_string(), "populartimes".to_string()],
            location_tolerance_m: 250.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdConfig {
    pub peak_threshold: f64,
    /// First hour of the window searched for the best time to visit.
    pub opening_hour: Hour,
    /// Window length; it wraps past midnight.
    pub open_hours: u8,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            peak_threshold: 70.0,
            opening_hour: 10,
            open_hours: 16,
        }
    }
}

impl Validate for TextSignalConfig {
    fn validate(&self) -> Result<()> {
        if self.capacity_nouns.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "estimator.text.capacity_nouns".to_string(),
            });
        }
        for noun in self.capacity_nouns.iter().chain(&self.capacity_verbs) {
            validate_non_empty_string("estimator.text.capacity_nouns", noun)?;
        }
        if self.min_explicit > self.max_explicit {
            return Err(EtlError::InvalidConfigValueError {
                field: "estimator.text.min_explicit".to_string(),
                value: self.min_explicit.to_string(),
                reason: format!("must not exceed max_explicit ({})", self.max_explicit),
            });
        }
        for entry in &self.keywords {
            validate_non_empty_string("estimator.text.keywords", &entry.keyword)?;
            validate_positive_number("estimator.text.keywords", entry.value as usize, 1)?;
        }
        Ok(())
    }
}

impl Validate for CapacityConfig {
    fn validate(&self) -> Result<()> {
        for entry in &self.categories {
            validate_non_empty_string("estimator.capacity.categories", &entry.category)?;
            validate_positive_number("estimator.capacity.categories", entry.value as usize, 1)?;
        }
        validate_positive_number(
            "estimator.capacity.default_baseline",
            self.default_baseline as usize,
            1,
        )?;
        validate_non_negative_f64("estimator.capacity.price_multiplier", self.price_multiplier)?;
        validate_positive_f64(
            "estimator.capacity.review_volume_factor",
            self.review_volume_factor,
        )?;
        if self.review_volume_factor < 1.0 {
            return Err(EtlError::InvalidConfigValueError {
                field: "estimator.capacity.review_volume_factor".to_string(),
                value: self.review_volume_factor.to_string(),
                reason: "an uplift factor below 1 would shrink popular venues".to_string(),
            });
        }
        validate_non_negative_f64("estimator.capacity.review_volume_cap", self.review_volume_cap)?;
        Ok(())
    }
}

impl Validate for AffluenceConfig {
    fn validate(&self) -> Result<()> {
        let w = &self.weights;
        validate_non_negative_f64("estimator.affluence.weights.current_busy", w.current_busy)?;
        validate_non_negative_f64("estimator.affluence.weights.peak_density", w.peak_density)?;
        validate_non_negative_f64(
            "estimator.affluence.weights.review_velocity",
            w.review_velocity,
        )?;
        validate_non_negative_f64(
            "estimator.affluence.weights.checkin_frequency",
            w.checkin_frequency,
        )?;
        validate_positive_f64(
            "estimator.affluence.weights",
            w.current_busy + w.peak_density + w.review_velocity + w.checkin_frequency,
        )?;
        validate_positive_number("estimator.affluence.peak_top_hours", self.peak_top_hours, 1)?;
        validate_positive_f64(
            "estimator.affluence.review_velocity_scale",
            self.review_velocity_scale,
        )?;
        validate_positive_f64("estimator.affluence.checkin_scale", self.checkin_scale)?;
        Ok(())
    }
}

impl Validate for EstimatorConfig {
    fn validate(&self) -> Result<()> {
        self.text.validate()?;
        self.capacity.validate()?;
        self.affluence.validate()?;
        validate_positive_f64(
            "estimator.merge.location_tolerance_m",
            self.merge.location_tolerance_m,
        )?;
        validate_range(
            "estimator.crowd.peak_threshold",
            self.crowd.peak_threshold,
            0.0,
            100.0,
        )?;
        validate_range("estimator.crowd.opening_hour", self.crowd.opening_hour, 0, 23)?;
        validate_range("estimator.crowd.open_hours", self.crowd.open_hours, 1, 24)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EstimatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EstimatorConfig = toml::from_str(
            r#"
[capacity]
price_multiplier = 5.0

[affluence.weights]
current_busy = 50.0
"#,
        )
        .unwrap();

        assert_eq!(config.capacity.price_multiplier, 5.0);
        assert_eq!(config.capacity.default_baseline, 40);
        assert_eq!(config.affluence.weights.current_busy, 50.0);
        assert_eq!(config.affluence.weights.peak_density, 30.0);
        assert_eq!(config.text.keywords.len(), 15);
    }

    #[test]
    fn test_keyword_table_from_toml() {
        let config: EstimatorConfig = toml::from_str(
            r#"
[[text.keywords]]
keyword = "piccolo"
value = 20
"#,
        )
        .unwrap();
        assert_eq!(config.text.keywords, vec![keyword("piccolo", 20)]);
    }

    #[test]
    fn test_rejects_all_zero_weights() {
        let mut config = EstimatorConfig::default();
        config.affluence.weights = AffluenceWeights {
            current_busy: 0.0,
            peak_density: 0.0,
            review_velocity: 0.0,
            checkin_frequency: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_explicit_range() {
        let mut config = EstimatorConfig::default();
        config.text.min_explicit = 600;
        assert!(config.validate().is_err());
    }
}
