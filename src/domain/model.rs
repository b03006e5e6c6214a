use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Hour of day, 0-23.
pub type Hour = u8;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Great-circle (haversine) distance in metres.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// One provider's view of a venue, as it arrives from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVenueRecord {
    pub source: String,
    pub id: String,
    /// Upstream correlation key shared by records of the same physical venue.
    #[serde(default)]
    pub venue_key: Option<String>,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub price_level: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: u64,
    #[serde(default)]
    pub reviews: Vec<String>,
    #[serde(default)]
    pub busy_percent: Option<f64>,
    #[serde(default)]
    pub popular_hours: BTreeMap<Hour, f64>,
    #[serde(default)]
    pub checkins: Option<u64>,
    #[serde(default)]
    pub visit_duration_minutes: Option<u32>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl RawVenueRecord {
    pub fn new(source: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            venue_key: None,
            name: name.into(),
            categories: Vec::new(),
            price_level: None,
            rating: None,
            review_count: 0,
            reviews: Vec::new(),
            busy_percent: None,
            popular_hours: BTreeMap::new(),
            checkins: None,
            visit_duration_minutes: None,
            location: None,
            address: None,
            phone: None,
            website: None,
        }
    }

    /// Grouping key; records without a correlation key stand alone.
    pub fn group_key(&self) -> String {
        match &self.venue_key {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => format!("{}:{}", self.source, self.id),
        }
    }
}

fn check_range(venue: &str, field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(EtlError::malformed(venue, field, "is not a finite number"));
    }
    if value < min || value > max {
        return Err(EtlError::malformed(
            venue,
            field,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(())
}

/// Shape checks applied at the feed boundary, before any estimator sees the record.
impl Validate for RawVenueRecord {
    fn validate(&self) -> Result<()> {
        let venue = self.group_key();

        if self.source.trim().is_empty() {
            return Err(EtlError::malformed(&venue, "source", "cannot be empty"));
        }
        if self.id.trim().is_empty() {
            return Err(EtlError::malformed(&venue, "id", "cannot be empty"));
        }
        if let Some(price) = self.price_level {
            if !(0..=4).contains(&price) {
                return Err(EtlError::malformed(
                    &venue,
                    "price_level",
                    format!("{} is outside 0..=4", price),
                ));
            }
        }
        if let Some(rating) = self.rating {
            check_range(&venue, "rating", rating, 0.0, 5.0)?;
        }
        if let Some(busy) = self.busy_percent {
            check_range(&venue, "busy_percent", busy, 0.0, 100.0)?;
        }
        for (hour, busy) in &self.popular_hours {
            if *hour > 23 {
                return Err(EtlError::malformed(
                    &venue,
                    "popular_hours",
                    format!("hour {} is outside 0..=23", hour),
                ));
            }
            check_range(&venue, "popular_hours", *busy, 0.0, 100.0)?;
        }
        if let Some(location) = self.location {
            check_range(&venue, "location.lat", location.lat, -90.0, 90.0)?;
            check_range(&venue, "location.lng", location.lng, -180.0, 180.0)?;
        }
        Ok(())
    }
}

/// A venue after cross-provider merging. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedVenueRecord {
    pub venue_key: String,
    /// provider -> native id
    pub provider_ids: BTreeMap<String, String>,
    pub name: String,
    pub categories: BTreeSet<String>,
    pub price_level: Option<u8>,
    pub rating: Option<f64>,
    pub review_count: u64,
    pub reviews: Vec<String>,
    pub busy_percent: Option<f64>,
    pub popular_hours: BTreeMap<Hour, f64>,
    pub checkins: Option<u64>,
    pub visit_duration_minutes: Option<u32>,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

pub(crate) fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

impl From<&RawVenueRecord> for UnifiedVenueRecord {
    fn from(raw: &RawVenueRecord) -> Self {
        let mut provider_ids = BTreeMap::new();
        provider_ids.insert(raw.source.clone(), raw.id.clone());

        Self {
            venue_key: raw.group_key(),
            provider_ids,
            name: raw.name.clone(),
            categories: raw.categories.iter().filter_map(|t| normalize_tag(t)).collect(),
            price_level: raw.price_level.and_then(|p| u8::try_from(p).ok()),
            rating: raw.rating,
            review_count: raw.review_count,
            reviews: raw.reviews.clone(),
            busy_percent: raw.busy_percent,
            popular_hours: raw.popular_hours.clone(),
            checkins: raw.checkins,
            visit_duration_minutes: raw.visit_duration_minutes,
            location: raw.location,
            address: raw.address.clone(),
            phone: raw.phone.clone(),
            website: raw.website.clone(),
        }
    }
}

/// One discrete piece of capacity evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapacitySignal {
    ExplicitMention { value: u32 },
    KeywordMatch { keyword: String, value: u32 },
    /// Estimate from an image-analysis collaborator.
    PhotoEstimate { value: u32 },
    CategoryBaseline { category: String, value: u32 },
    PriceAdjustment { delta: f64 },
}

/// Which reduction a signal participates in; lower tiers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EvidenceTier {
    Explicit,
    Descriptive,
    Baseline,
    Adjustment,
}

impl CapacitySignal {
    pub fn tier(&self) -> EvidenceTier {
        match self {
            CapacitySignal::ExplicitMention { .. } => EvidenceTier::Explicit,
            CapacitySignal::KeywordMatch { .. } | CapacitySignal::PhotoEstimate { .. } => {
                EvidenceTier::Descriptive
            }
            CapacitySignal::CategoryBaseline { .. } => EvidenceTier::Baseline,
            CapacitySignal::PriceAdjustment { .. } => EvidenceTier::Adjustment,
        }
    }

    /// Capacity value carried by evidence signals; `None` for adjustments.
    pub fn value(&self) -> Option<f64> {
        match self {
            CapacitySignal::ExplicitMention { value }
            | CapacitySignal::KeywordMatch { value, .. }
            | CapacitySignal::PhotoEstimate { value }
            | CapacitySignal::CategoryBaseline { value, .. } => Some(f64::from(*value)),
            CapacitySignal::PriceAdjustment { .. } => None,
        }
    }
}

impl fmt::Display for CapacitySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacitySignal::ExplicitMention { value } => write!(f, "explicit_mention={}", value),
            CapacitySignal::KeywordMatch { keyword, value } => {
                write!(f, "keyword:{}={}", keyword, value)
            }
            CapacitySignal::PhotoEstimate { value } => write!(f, "photo_estimate={}", value),
            CapacitySignal::CategoryBaseline { category, value } => {
                write!(f, "category_baseline:{}={}", category, value)
            }
            CapacitySignal::PriceAdjustment { delta } => write!(f, "price_adjustment={:+}", delta),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityEstimate {
    pub capacity: u32,
    pub confidence: Confidence,
    /// Trace of contributing signals and adjustments, in computation order.
    pub signals: Vec<String>,
    pub methodology: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffluenceComponent {
    CurrentBusy,
    PeakDensity,
    ReviewVelocity,
    CheckinFrequency,
}

impl AffluenceComponent {
    pub const ALL: [AffluenceComponent; 4] = [
        AffluenceComponent::CurrentBusy,
        AffluenceComponent::PeakDensity,
        AffluenceComponent::ReviewVelocity,
        AffluenceComponent::CheckinFrequency,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub component: AffluenceComponent,
    /// 0-100, or `None` when the underlying signal was absent.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffluenceScore {
    pub score: f64,
    pub components: Vec<ComponentScore>,
}

impl AffluenceScore {
    pub fn component(&self, component: AffluenceComponent) -> Option<f64> {
        self.components
            .iter()
            .find(|c| c.component == component)
            .and_then(|c| c.value)
    }

    /// A zero score with every component absent means "no data", not "empty venue".
    pub fn has_data(&self) -> bool {
        self.components.iter().any(|c| c.value.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrowdInsights {
    pub peak_hours: Vec<Hour>,
    pub best_time_to_visit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVenue {
    pub venue: UnifiedVenueRecord,
    pub capacity: CapacityEstimate,
    pub affluence: AffluenceScore,
    pub crowd: CrowdInsights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedInput,
    Conflict,
    Processing,
}

/// A record or venue group dropped from the batch, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueFailure {
    pub venue_key: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub records: Vec<RawVenueRecord>,
    pub rejected: Vec<VenueFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub scored: Vec<ScoredVenue>,
    pub failures: Vec<VenueFailure>,
}

/// Flat sink row shared by the CSV and JSON outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRow {
    pub venue_key: String,
    pub provider_ids: String,
    pub name: String,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub rating: Option<f64>,
    pub review_count: u64,
    pub price_level: Option<u8>,
    pub bar_types: String,
    pub estimated_capacity: u32,
    pub capacity_confidence: Confidence,
    pub capacity_signals: String,
    pub capacity_methodology: String,
    pub current_popularity: Option<f64>,
    pub peak_hours: String,
    pub best_time_to_visit: String,
    pub typical_visit_duration: Option<u32>,
    pub affluence_score: f64,
    pub collected_at: String,
}

impl VenueRow {
    pub fn from_scored(scored: &ScoredVenue, collected_at: &str) -> Self {
        let venue = &scored.venue;
        Self {
            venue_key: venue.venue_key.clone(),
            provider_ids: venue
                .provider_ids
                .iter()
                .map(|(provider, id)| format!("{}:{}", provider, id))
                .collect::<Vec<_>>()
                .join(","),
            name: venue.name.clone(),
            address: venue.address.clone().unwrap_or_default(),
            lat: venue.location.map(|l| l.lat),
            lng: venue.location.map(|l| l.lng),
            rating: venue.rating,
            review_count: venue.review_count,
            price_level: venue.price_level,
            bar_types: venue.categories.iter().cloned().collect::<Vec<_>>().join(","),
            estimated_capacity: scored.capacity.capacity,
            capacity_confidence: scored.capacity.confidence,
            capacity_signals: scored.capacity.signals.join("|"),
            capacity_methodology: scored.capacity.methodology.clone(),
            current_popularity: venue.busy_percent,
            peak_hours: scored
                .crowd
                .peak_hours
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<_>>()
                .join(","),
            best_time_to_visit: scored.crowd.best_time_to_visit.clone().unwrap_or_default(),
            typical_visit_duration: venue.visit_duration_minutes,
            affluence_score: (scored.affluence.score * 10.0).round() / 10.0,
            collected_at: collected_at.to_string(),
        }
    }
}
