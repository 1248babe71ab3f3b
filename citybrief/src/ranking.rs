use serde::Serialize;
use tracing::debug;

use crate::locale::Locale;
use crate::news::NewsItem;
use crate::relevance;

/// Upper bound on relevant items returned, whatever `limit` asks for.
pub const MAX_RELEVANT: usize = 5;
/// Items returned when no locale applies or nothing matched.
pub const FALLBACK_COUNT: usize = 3;

/// Result of ranking a candidate set against one locale.
///
/// The counts describe the whole candidate set, before truncation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceResult {
    pub relevant_count: usize,
    pub total_count: usize,
    pub relevance_rate: f64,
    pub ranked_items: Vec<NewsItem>,
    /// True when `ranked_items` came from the empty-match fallback
    pub empty_match: bool,
}

impl RelevanceResult {
    fn unranked(items: &[NewsItem]) -> Self {
        Self {
            relevant_count: 0,
            total_count: items.len(),
            relevance_rate: 0.0,
            ranked_items: leading(items),
            empty_match: false,
        }
    }
}

/// Rank `items` for `locale`, returning at most `min(limit, MAX_RELEVANT)`
/// relevant items in descending score order. A `limit` of 0 counts as 1. Equal scores keep their input
/// order. With no locale, or nothing relevant, the first [`FALLBACK_COUNT`]
/// input items are returned as-is.
pub fn rank(items: &[NewsItem], locale: Option<&Locale>, limit: usize) -> RelevanceResult {
    let Some(locale) = locale else {
        return RelevanceResult::unranked(items);
    };

    let mut scored: Vec<NewsItem> = items
        .iter()
        .map(|item| {
            let result = relevance::score(item, Some(locale));
            let mut item = item.clone();
            item.relevance_score = result.score;
            item.relevance_level = result.level;
            item
        })
        .collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

    let relevant_count = scored.iter().filter(|i| i.relevance_score > 0).count();
    let total_count = items.len();
    let relevance_rate = if total_count == 0 {
        0.0
    } else {
        relevant_count as f64 / total_count as f64
    };

    debug!(
        locale = locale.name(),
        relevant_count, total_count, "ranked news candidates"
    );

    if relevant_count == 0 {
        return empty_match_fallback(items, total_count);
    }

    scored.truncate(relevant_count.min(limit.clamp(1, MAX_RELEVANT)));
    RelevanceResult {
        relevant_count,
        total_count,
        relevance_rate,
        ranked_items: scored,
        empty_match: false,
    }
}

/// Nothing matched the locale: show the head of the feed rather than nothing.
fn empty_match_fallback(items: &[NewsItem], total_count: usize) -> RelevanceResult {
    RelevanceResult {
        relevant_count: 0,
        total_count,
        relevance_rate: 0.0,
        ranked_items: leading(items),
        empty_match: true,
    }
}

fn leading(items: &[NewsItem]) -> Vec<NewsItem> {
    items.iter().take(FALLBACK_COUNT).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relevance::RelevanceLevel;

    fn item(title: &str, summary: &str) -> NewsItem {
        NewsItem::new(title, summary)
    }

    #[test]
    fn beijing_scenario() {
        let locale = Locale::new("北京", ["首都", "京津冀", "华北", "中关村", "望京", "朝阳", "海淀"]);
        let items = vec![item("北京科技中心", ""), item("随机新闻", "随机内容")];

        let result = rank(&items, Some(&locale), MAX_RELEVANT);

        assert_eq!(result.relevant_count, 1);
        assert_eq!(result.total_count, 2);
        assert!((result.relevance_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.ranked_items.len(), 1);
        assert_eq!(result.ranked_items[0].title, "北京科技中心");
        assert_eq!(result.ranked_items[0].relevance_score, 3);
        assert_eq!(result.ranked_items[0].relevance_level, RelevanceLevel::Medium);
        assert!(!result.empty_match);
    }

    #[test]
    fn unknown_locale_returns_first_three_unchanged() {
        let items: Vec<NewsItem> = (0..5).map(|i| item(&format!("news {i}"), "")).collect();

        let result = rank(&items, None, MAX_RELEVANT);

        assert_eq!(result.ranked_items, items[..3].to_vec());
        assert_eq!(result.relevant_count, 0);
        assert_eq!(result.total_count, 5);
        assert_eq!(result.relevance_rate, 0.0);
        assert!(!result.empty_match);
    }

    #[test]
    fn empty_match_falls_back_to_feed_head() {
        let locale = Locale::new("上海", ["浦东"]);
        let items: Vec<NewsItem> = (0..6).map(|i| item(&format!("news {i}"), "")).collect();

        let result = rank(&items, Some(&locale), MAX_RELEVANT);

        assert!(result.empty_match);
        assert_eq!(result.ranked_items.len(), 3);
        assert_eq!(result.ranked_items[0].title, "news 0");
        assert_eq!(result.ranked_items[2].title, "news 2");
        assert_eq!(result.total_count, 6);
    }

    #[test]
    fn zero_limit_still_returns_top_item() {
        let locale = Locale::new("上海", ["浦东"]);
        let items = vec![item("随机新闻", ""), item("浦东新区", ""), item("上海浦东", "")];

        let result = rank(&items, Some(&locale), 0);

        assert_eq!(result.relevant_count, 2);
        assert_eq!(result.ranked_items.len(), 1);
        assert_eq!(result.ranked_items[0].title, "上海浦东");
        assert!(!result.empty_match);
    }

    #[test]
    fn ties_keep_input_order() {
        let locale = Locale::new("上海", ["浦东"]);
        let items = vec![
            item("a 上海", ""),
            item("b", "浦东"),
            item("c 上海 浦东", ""),
            item("d 浦东", ""),
            item("e", "上海"),
        ];

        let result = rank(&items, Some(&locale), MAX_RELEVANT);
        let titles: Vec<&str> = result.ranked_items.iter().map(|i| i.title.as_str()).collect();

        // c=6, a=3, d=3, b=1, e=1
        assert_eq!(titles, vec!["c 上海 浦东", "a 上海", "d 浦东", "b", "e"]);
    }

    #[test]
    fn relevant_items_capped_at_five() {
        let locale = Locale::new("上海", Vec::<String>::new());
        let items: Vec<NewsItem> = (0..8).map(|i| item(&format!("上海 {i}"), "")).collect();

        let result = rank(&items, Some(&locale), 20);

        assert_eq!(result.relevant_count, 8);
        assert_eq!(result.ranked_items.len(), MAX_RELEVANT);
        assert_eq!(result.ranked_items[4].title, "上海 4");
    }

    #[test]
    fn limit_below_cap_is_honoured() {
        let locale = Locale::new("上海", Vec::<String>::new());
        let items: Vec<NewsItem> = (0..4).map(|i| item(&format!("上海 {i}"), "")).collect();

        let result = rank(&items, Some(&locale), 2);

        assert_eq!(result.ranked_items.len(), 2);
        assert_eq!(result.relevant_count, 4);
    }

    #[test]
    fn empty_input() {
        let locale = Locale::new("上海", Vec::<String>::new());
        let result = rank(&[], Some(&locale), MAX_RELEVANT);
        assert!(result.ranked_items.is_empty());
        assert_eq!(result.relevance_rate, 0.0);
    }
}
