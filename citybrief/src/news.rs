use serde::{Deserialize, Serialize};

use crate::relevance::RelevanceLevel;

/// A headline as fetched from the news feed.
///
/// The fetched fields never change; `relevance_score`/`relevance_level` are
/// attached by the ranker and recomputed for every locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    /// Intro / teaser text from the feed
    pub summary: String,
    pub source: String,
    pub publish_time: String,
    pub category: String,
    #[serde(default)]
    pub relevance_score: u32,
    #[serde(default)]
    pub relevance_level: RelevanceLevel,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: String::new(),
            summary: summary.into(),
            source: String::new(),
            publish_time: String::new(),
            category: String::new(),
            relevance_score: 0,
            relevance_level: RelevanceLevel::None,
        }
    }
}
