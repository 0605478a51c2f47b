//! Recommendation-fallback heuristic
//!
//! The upstream model sometimes narrates products without emitting the
//! structured block. When a reply carries no navigational command but its
//! prose reads like a product recommendation, the dispatcher synthesizes a
//! search navigation from the shopper's own words. Best-effort recovery,
//! not a guarantee; every threshold is configurable.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::HeuristicsConfig;

/// Currency-like price mentions: symbols or currency words next to a number
static PRICE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[$₹€£]\s?\d[\d,]*(?:\.\d{1,2})?|\b\d[\d,]*(?:\.\d{1,2})?\s?(?:dollars|rupees|usd|inr|eur)\b|\brs\.?\s?\d[\d,]*\b)")
        .expect("valid regex")
});

/// Capitalized multi-word phrases (candidate product names)
static PHRASE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").expect("valid regex")
});

/// Filler words stripped from spoken queries before search synthesis
const FILLER_WORDS: &[&str] = &[
    "show", "me", "some", "something", "please", "can", "could", "you", "i", "want", "wanna",
    "to", "see", "find", "looking", "for", "a", "an", "the", "do", "have", "give", "get",
    "would", "like", "need", "hey", "hi", "um", "uh", "maybe", "just",
];

/// Detects replies that read like product recommendations
pub struct RecommendationHeuristic {
    config: HeuristicsConfig,
}

impl RecommendationHeuristic {
    /// Create a heuristic with the given thresholds
    #[must_use]
    pub const fn new(config: HeuristicsConfig) -> Self {
        Self { config }
    }

    /// Whether the reply prose strongly resembles a product recommendation
    ///
    /// Any one signal crossing its threshold triggers: price-like mentions,
    /// repeated capitalized multi-word phrases, or domain keyword density.
    #[must_use]
    pub fn looks_like_recommendation(&self, text: &str) -> bool {
        let price_mentions = PRICE_REGEX.find_iter(text).count();
        if price_mentions >= self.config.min_price_mentions {
            tracing::debug!(price_mentions, "recommendation signal: prices");
            return true;
        }

        let repeated_phrases = repeated_phrase_count(text);
        if repeated_phrases >= self.config.min_repeated_phrases {
            tracing::debug!(repeated_phrases, "recommendation signal: phrases");
            return true;
        }

        let keyword_hits = self.keyword_hits(text);
        if keyword_hits >= self.config.min_keyword_hits {
            tracing::debug!(keyword_hits, "recommendation signal: keywords");
            return true;
        }

        false
    }

    /// Synthesize a search query from the shopper's utterance
    ///
    /// Strips filler words and caps the result at the configured word count.
    /// Falls back to the leading words of the utterance if stripping leaves
    /// nothing.
    #[must_use]
    pub fn search_query_from(&self, utterance: &str) -> String {
        search_query(utterance, self.config.max_query_words)
    }

    fn keyword_hits(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .filter(|word| self.config.keywords.iter().any(|k| k == word))
            .count()
    }
}

/// Count capitalized multi-word phrases that appear at least twice
fn repeated_phrase_count(text: &str) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for found in PHRASE_REGEX.find_iter(text) {
        *counts.entry(found.as_str()).or_insert(0) += 1;
    }
    counts.values().filter(|&&n| n >= 2).count()
}

/// Filler-stripped query of at most `max_words` words
fn search_query(utterance: &str, max_words: usize) -> String {
    let words: Vec<&str> = utterance
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let kept: Vec<String> = words
        .iter()
        .filter(|w| !FILLER_WORDS.contains(&w.to_lowercase().as_str()))
        .take(max_words)
        .map(|w| w.to_lowercase())
        .collect();

    if kept.is_empty() {
        return words
            .iter()
            .take(max_words)
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
    }

    kept.join(" ")
}
