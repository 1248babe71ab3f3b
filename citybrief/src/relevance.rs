//! Keyword relevance of a news item to a locale.
//!
//! Scoring policy (fixed, tests depend on the exact cut points):
//! - every locale keyword found in the title adds [`TITLE_WEIGHT`]
//! - every locale keyword found in the summary adds [`SUMMARY_WEIGHT`]
//! - a keyword found in both fields counts for both
//!
//! Matching is case-insensitive substring matching; keywords are already
//! lower-cased by [`Locale::new`].

use serde::{Deserialize, Serialize};

use crate::locale::Locale;
use crate::news::NewsItem;

pub const TITLE_WEIGHT: u32 = 3;
pub const SUMMARY_WEIGHT: u32 = 1;

pub const HIGH_THRESHOLD: u32 = 6;
pub const MEDIUM_THRESHOLD: u32 = 3;
pub const LOW_THRESHOLD: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl RelevanceLevel {
    pub fn from_score(score: u32) -> Self {
        if score >= HIGH_THRESHOLD {
            RelevanceLevel::High
        } else if score >= MEDIUM_THRESHOLD {
            RelevanceLevel::Medium
        } else if score >= LOW_THRESHOLD {
            RelevanceLevel::Low
        } else {
            RelevanceLevel::None
        }
    }
}

/// Outcome of scoring one item against one locale
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelevanceScore {
    pub score: u32,
    pub level: RelevanceLevel,
    /// Keywords that hit the title or summary, in keyword order, each listed once
    pub matched_keywords: Vec<String>,
}

/// Score `item` against `locale`. `None` (unregistered locale) scores zero
/// without attempting a match.
pub fn score(item: &NewsItem, locale: Option<&Locale>) -> RelevanceScore {
    let Some(locale) = locale else {
        return RelevanceScore::default();
    };

    let title = item.title.to_lowercase();
    let summary = item.summary.to_lowercase();

    let mut total = 0;
    let mut matched = Vec::new();
    for keyword in locale.keywords() {
        let in_title = title.contains(keyword.as_str());
        let in_summary = summary.contains(keyword.as_str());
        if in_title {
            total += TITLE_WEIGHT;
        }
        if in_summary {
            total += SUMMARY_WEIGHT;
        }
        if (in_title || in_summary) && !matched.contains(keyword) {
            matched.push(keyword.clone());
        }
    }

    RelevanceScore {
        score: total,
        level: RelevanceLevel::from_score(total),
        matched_keywords: matched,
    }
}
