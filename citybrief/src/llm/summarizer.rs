// Model completion with deterministic fallbacks
use serde::Serialize;
use tracing::{info, warn};

use super::{LlmProvider, LlmRequest};
use crate::error::failure_kind;
use crate::news::NewsItem;
use crate::prompt::{ADVICE_HEADING, ANSWER_HEADING, NEWS_HEADING, NOTES_HEADING, UNKNOWN, WEATHER_HEADING};
use crate::weather::WeatherReport;

/// News titles listed in the fallback summary
const FALLBACK_TITLES: usize = 3;
/// Characters of article text quoted in the fallback answer
const FALLBACK_EXCERPT_CHARS: usize = 200;

/// Where a piece of generated text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionOrigin {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub origin: CompletionOrigin,
}

/// Run `request` against `provider`, or use `fallback` when there is no
/// provider, the call fails, or the model answers with nothing. Never fails.
pub async fn complete_or_fallback<P, F>(
    provider: Option<&P>,
    request: LlmRequest,
    fallback: F,
) -> Completion
where
    P: LlmProvider + ?Sized,
    F: FnOnce() -> String,
{
    let Some(provider) = provider else {
        info!("no model configured, using template");
        return Completion {
            text: fallback(),
            origin: CompletionOrigin::Fallback,
        };
    };

    match provider.generate(request).await {
        Ok(response) if !response.content.trim().is_empty() => {
            info!(
                model = %response.model,
                total_tokens = response.usage.total_tokens,
                "model completion succeeded"
            );
            Completion {
                text: response.content,
                origin: CompletionOrigin::Model,
            }
        }
        Ok(response) => {
            warn!(model = %response.model, kind = "payload", "model returned empty content, using template");
            Completion {
                text: fallback(),
                origin: CompletionOrigin::Fallback,
            }
        }
        Err(e) => {
            warn!(kind = failure_kind(&e), error = %e, "model completion failed, using template");
            Completion {
                text: fallback(),
                origin: CompletionOrigin::Fallback,
            }
        }
    }
}

/// Summary built from the gathered data alone. `locale` is set when the
/// news was ranked for a registered locale.
pub fn fallback_summary(weather: &WeatherReport, news: &[NewsItem], locale: Option<&str>) -> String {
    let field = |v: &str| -> String {
        if v.trim().is_empty() {
            UNKNOWN.to_string()
        } else {
            v.to_string()
        }
    };
    let city = if weather.city.trim().is_empty() {
        locale.unwrap_or("当前城市").to_string()
    } else {
        weather.city.clone()
    };

    let titles: Vec<String> = news
        .iter()
        .take(FALLBACK_TITLES)
        .filter(|n| !n.title.trim().is_empty())
        .map(|n| format!("• {}", n.title))
        .collect();

    let (news_heading, advice) = match locale {
        Some(l) => (
            format!("{}（{}相关）", NEWS_HEADING, l),
            format!("根据{}天气情况合理安排出行，关注本地热点新闻动态，保持信息敏感度。", l),
        ),
        None => (
            NEWS_HEADING.to_string(),
            "根据天气情况合理安排出行，关注热点新闻动态，保持信息敏感度。".to_string(),
        ),
    };

    format!(
        "# AI智能汇总报告\n\n{}\n\n{}今日天气{}，气温{}°C，湿度{}%，风速{}km/h。\n\n{}\n\n{}\n\n{}\n\n{}",
        WEATHER_HEADING,
        city,
        field(&weather.description),
        field(&weather.temperature),
        field(&weather.humidity),
        field(&weather.wind_speed),
        news_heading,
        titles.join("\n"),
        ADVICE_HEADING,
        advice,
    )
}

/// Answer built from the article alone when the model is unavailable.
pub fn fallback_answer(title: &str, content: &str, question: &str) -> String {
    let title = if title.trim().is_empty() { "未知标题" } else { title.trim() };
    let mut excerpt: String = content.trim().chars().take(FALLBACK_EXCERPT_CHARS).collect();
    if content.trim().chars().count() > FALLBACK_EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    if excerpt.is_empty() {
        excerpt = UNKNOWN.to_string();
    }

    format!(
        "{}\n\n暂时无法获取AI分析，以下是新闻《{}》的内容摘录，供参考：\n\n{}\n\n{}\n\n您的问题“{}”需要结合完整新闻内容判断，请稍后重试。",
        ANSWER_HEADING,
        title,
        excerpt,
        NOTES_HEADING,
        question.trim(),
    )
}
