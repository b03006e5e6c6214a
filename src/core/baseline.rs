use crate::config::estimator::CapacityConfig;
use crate::domain::model::{normalize_tag, CapacitySignal};
use std::collections::BTreeSet;

pub const DEFAULT_CATEGORY: &str = "default";

/// Category tag -> representative capacity, consulted in priority order.
#[derive(Debug, Clone)]
pub struct CategoryBaselineTable {
    entries: Vec<(String, u32)>,
    default_value: u32,
}

impl CategoryBaselineTable {
    pub fn new(config: &CapacityConfig) -> Self {
        let entries = config
            .categories
            .iter()
            .filter_map(|entry| normalize_tag(&entry.category).map(|tag| (tag, entry.value)))
            .collect();

        Self {
            entries,
            default_value: config.default_baseline,
        }
    }

    /// Always exactly one signal: the highest-priority tag the venue carries,
    /// or the default when none matches.
    pub fn baseline<S: AsRef<str>>(&self, tags: &[S]) -> CapacitySignal {
        let tags: BTreeSet<String> = tags.iter().filter_map(|t| normalize_tag(t.as_ref())).collect();

        self.entries
            .iter()
            .find(|(category, _)| tags.contains(category))
            .map(|(category, value)| CapacitySignal::CategoryBaseline {
                category: category.clone(),
                value: *value,
            })
            .unwrap_or_else(|| CapacitySignal::CategoryBaseline {
                category: DEFAULT_CATEGORY.to_string(),
                value: self.default_value,
            })
    }
}
