//! Review text mining: turns free-form review strings into capacity hints.
//!
//! Two kinds of hints come out of a review:
//! - explicit head counts ("fits about 40 people", "60 seats")
//! - size descriptors ("cozy", "huge") mapped to a representative value
//!
//! Nothing found is the common case and yields an empty list.

use crate::config::estimator::TextSignalConfig;
use crate::domain::model::CapacitySignal;
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TextSignalExtractor {
    /// number, then a capacity noun ("40 people")
    count_then_noun: Regex,
    /// capacity verb, then a number ("fits 40")
    verb_then_count: Option<Regex>,
    keywords: Vec<(String, u32)>,
    min_explicit: u32,
    max_explicit: u32,
}

fn alternation(words: &[String]) -> String {
    let mut words: Vec<&str> = words.iter().map(|w| w.trim()).filter(|w| !w.is_empty()).collect();
    // longest first so "capacity of" wins over "capacity"
    words.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    words.dedup();
    words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| EtlError::ConfigError {
        message: format!("invalid capacity mention pattern: {}", e),
    })
}

impl TextSignalExtractor {
    pub fn new(config: &TextSignalConfig) -> Result<Self> {
        let window = config.mention_window;
        let filler = format!(r"(?:[a-z']+\s+){{0,{}}}?", window);

        let count_then_noun = compile(&format!(
            r"(?i)\b(\d{{1,4}})[\s-]+{}(?:{})\b",
            filler,
            alternation(&config.capacity_nouns)
        ))?;

        let verb_then_count = if config.capacity_verbs.is_empty() {
            None
        } else {
            Some(compile(&format!(
                r"(?i)\b(?:{})\s+{}(\d{{1,4}})\b",
                alternation(&config.capacity_verbs),
                filler
            ))?)
        };

        let keywords = config
            .keywords
            .iter()
            .map(|k| (k.keyword.trim().to_lowercase(), k.value))
            .filter(|(k, _)| !k.is_empty())
            .collect();

        Ok(Self {
            count_then_noun,
            verb_then_count,
            keywords,
            min_explicit: config.min_explicit,
            max_explicit: config.max_explicit,
        })
    }

    /// Extracts `ExplicitMention` and `KeywordMatch` signals, review by review.
    /// Duplicates across reviews are kept; the estimator resolves them.
    pub fn extract<S: AsRef<str>>(&self, reviews: &[S]) -> Vec<CapacitySignal> {
        let mut signals = Vec::new();

        for review in reviews {
            let text = review.as_ref();
            if text.trim().is_empty() {
                continue;
            }

            for value in self.explicit_mentions(text) {
                signals.push(CapacitySignal::ExplicitMention { value });
            }

            let lowered = text.to_lowercase();
            for (keyword, value) in &self.keywords {
                if lowered.contains(keyword.as_str()) {
                    signals.push(CapacitySignal::KeywordMatch {
                        keyword: keyword.clone(),
                        value: *value,
                    });
                }
            }
        }

        signals
    }

    /// Head counts in one review, ordered by position. A number matched by
    /// both patterns ("fits 40 people") is counted once.
    fn explicit_mentions(&self, text: &str) -> Vec<u32> {
        let mut by_offset: BTreeMap<usize, u32> = BTreeMap::new();

        let patterns = std::iter::once(&self.count_then_noun).chain(self.verb_then_count.iter());
        for pattern in patterns {
            for caps in pattern.captures_iter(text) {
                let Some(number) = caps.get(1) else { continue };
                let Ok(value) = number.as_str().parse::<u32>() else {
                    continue;
                };
                if (self.min_explicit..=self.max_explicit).contains(&value) {
                    by_offset.insert(number.start(), value);
                }
            }
        }

        by_offset.into_values().collect()
    }
}
