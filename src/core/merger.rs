//! Cross-provider merge of records that describe the same physical venue.
//!
//! Grouping happens upstream; the merger only resolves fields. Every choice is
//! a max over a total order that does not depend on input order, so the result
//! is the same for any permutation of the group. Counts take the maximum,
//! never the sum, so merging an already merged record changes nothing.

use crate::config::estimator::MergeConfig;
use crate::domain::model::{GeoPoint, Hour, RawVenueRecord, UnifiedVenueRecord};
use crate::utils::error::{EtlError, Result};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct VenueMerger {
    provider_trust: Vec<String>,
    location_tolerance_m: f64,
}

/// How much a record is believed; compared field by field, highest wins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Standing {
    trust: Reverse<usize>,
    review_count: u64,
    identity: String,
}

/// Last-resort order on field values, for records with equal standing
/// (the same provider id reported twice).
trait ValueOrd {
    fn value_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! value_ord_via_ord {
    ($($t:ty),*) => {
        $(impl ValueOrd for $t {
            fn value_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }
        })*
    };
}

value_ord_via_ord!(u8, u32, String, Vec<String>);

impl ValueOrd for f64 {
    fn value_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl ValueOrd for GeoPoint {
    fn value_cmp(&self, other: &Self) -> Ordering {
        self.lat
            .total_cmp(&other.lat)
            .then_with(|| self.lng.total_cmp(&other.lng))
    }
}

impl ValueOrd for BTreeMap<Hour, f64> {
    fn value_cmp(&self, other: &Self) -> Ordering {
        self.iter()
            .zip(other.iter())
            .map(|((ha, a), (hb, b))| ha.cmp(hb).then_with(|| a.total_cmp(b)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.len().cmp(&other.len()))
    }
}

impl VenueMerger {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            provider_trust: config.provider_trust.clone(),
            location_tolerance_m: config.location_tolerance_m,
        }
    }

    pub fn merge(&self, records: &[RawVenueRecord]) -> Result<UnifiedVenueRecord> {
        let unified: Vec<UnifiedVenueRecord> = records.iter().map(UnifiedVenueRecord::from).collect();
        self.merge_unified(&unified)
    }

    pub fn merge_unified(&self, records: &[UnifiedVenueRecord]) -> Result<UnifiedVenueRecord> {
        let venue_key = records
            .iter()
            .map(|r| r.venue_key.as_str())
            .min()
            .ok_or_else(|| EtlError::malformed("<empty group>", "records", "merge needs at least one record"))?
            .to_string();

        let provider_ids = self.union_provider_ids(&venue_key, records)?;
        self.check_locations(&venue_key, records)?;

        let reviews = records
            .iter()
            .max_by(|a, b| {
                a.reviews
                    .len()
                    .cmp(&b.reviews.len())
                    .then_with(|| self.standing(a).cmp(&self.standing(b)))
                    .then_with(|| a.reviews.value_cmp(&b.reviews))
            })
            .map(|r| r.reviews.clone())
            .unwrap_or_default();

        let popular_hours = records
            .iter()
            .max_by(|a, b| {
                a.popular_hours
                    .len()
                    .cmp(&b.popular_hours.len())
                    .then_with(|| self.standing(a).cmp(&self.standing(b)))
                    .then_with(|| a.popular_hours.value_cmp(&b.popular_hours))
            })
            .map(|r| r.popular_hours.clone())
            .unwrap_or_default();

        let name = self
            .pick(records, |r| Some(&r.name).filter(|n| !n.trim().is_empty()))
            .cloned()
            .unwrap_or_default();

        let merged = UnifiedVenueRecord {
            venue_key,
            provider_ids,
            name,
            categories: records
                .iter()
                .flat_map(|r| r.categories.iter().cloned())
                .collect::<BTreeSet<_>>(),
            price_level: self.pick(records, |r| r.price_level.as_ref()).copied(),
            rating: self.pick(records, |r| r.rating.as_ref()).copied(),
            review_count: records.iter().map(|r| r.review_count).max().unwrap_or(0),
            reviews,
            busy_percent: self.pick(records, |r| r.busy_percent.as_ref()).copied(),
            popular_hours,
            checkins: records.iter().filter_map(|r| r.checkins).max(),
            visit_duration_minutes: self
                .pick(records, |r| r.visit_duration_minutes.as_ref())
                .copied(),
            location: self.pick(records, |r| r.location.as_ref()).copied(),
            address: self.pick_text(records, |r| r.address.as_ref()),
            phone: self.pick_text(records, |r| r.phone.as_ref()),
            website: self.pick_text(records, |r| r.website.as_ref()),
        };

        if records.len() > 1 {
            tracing::debug!(
                "Merged {} records for {} ({} providers)",
                records.len(),
                merged.venue_key,
                merged.provider_ids.len()
            );
        }
        Ok(merged)
    }

    fn trust_rank(&self, provider: &str) -> usize {
        self.provider_trust
            .iter()
            .position(|p| p == provider)
            .unwrap_or(self.provider_trust.len())
    }

    fn standing(&self, record: &UnifiedVenueRecord) -> Standing {
        let trust = record
            .provider_ids
            .keys()
            .map(|p| self.trust_rank(p))
            .min()
            .unwrap_or(self.provider_trust.len());
        let identity = record
            .provider_ids
            .iter()
            .map(|(provider, id)| format!("{}:{}", provider, id))
            .collect::<Vec<_>>()
            .join(",");

        Standing {
            trust: Reverse(trust),
            review_count: record.review_count,
            identity,
        }
    }

    /// Value from the best-standing record that has one; equal standing
    /// falls back to the larger value.
    fn pick<'a, T: ValueOrd>(
        &self,
        records: &'a [UnifiedVenueRecord],
        field: impl Fn(&'a UnifiedVenueRecord) -> Option<&'a T>,
    ) -> Option<&'a T> {
        records
            .iter()
            .filter_map(|r| field(r).map(|value| (self.standing(r), value)))
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.value_cmp(b.1)))
            .map(|(_, value)| value)
    }

    fn pick_text(
        &self,
        records: &[UnifiedVenueRecord],
        field: impl Fn(&UnifiedVenueRecord) -> Option<&String>,
    ) -> Option<String> {
        self.pick(records, |r| field(r).filter(|s| !s.trim().is_empty()))
            .cloned()
    }

    fn union_provider_ids(
        &self,
        venue_key: &str,
        records: &[UnifiedVenueRecord],
    ) -> Result<BTreeMap<String, String>> {
        let mut ids: BTreeMap<String, String> = BTreeMap::new();
        for record in records {
            for (provider, id) in &record.provider_ids {
                match ids.get(provider) {
                    Some(existing) if existing != id => {
                        return Err(EtlError::Conflict {
                            venue: venue_key.to_string(),
                            detail: format!(
                                "provider '{}' reports two ids: '{}' and '{}'",
                                provider,
                                existing.min(id),
                                existing.max(id)
                            ),
                        });
                    }
                    Some(_) => {}
                    None => {
                        ids.insert(provider.clone(), id.clone());
                    }
                }
            }
        }
        Ok(ids)
    }

    fn check_locations(&self, venue_key: &str, records: &[UnifiedVenueRecord]) -> Result<()> {
        let located: Vec<_> = records.iter().filter_map(|r| r.location).collect();

        let widest = located
            .iter()
            .enumerate()
            .flat_map(|(i, a)| located[i + 1..].iter().map(move |b| a.distance_m(b)))
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        match widest {
            Some(distance) if distance > self.location_tolerance_m => Err(EtlError::Conflict {
                venue: venue_key.to_string(),
                detail: format!(
                    "locations are {:.0}m apart (tolerance {:.0}m)",
                    distance, self.location_tolerance_m
                ),
            }),
            _ => Ok(()),
        }
    }
}
