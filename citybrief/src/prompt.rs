//! Prompt assembly for the summary and discussion flows.
//!
//! The output constraints embedded in each prompt (required headings, length
//! ceiling, forbidden meta-commentary) are the first line of defence against
//! reasoning leaking into answers; [`crate::sanitize`] is the second.

use std::fmt::Write as _;

use crate::news::NewsItem;
use crate::ranking::RelevanceResult;
use crate::sessions::ConversationTurn;
use crate::weather::WeatherReport;

/// Placeholder for any missing weather or news field
pub const UNKNOWN: &str = "未知";
const UNKNOWN_TITLE: &str = "未知标题";
const NO_SUMMARY: &str = "无摘要";

pub const SUMMARY_CHAR_LIMIT: usize = 300;
pub const DISCUSSION_CHAR_LIMIT: usize = 500;
pub const DEFAULT_HISTORY_WINDOW: usize = 3;
/// News items listed in a summary prompt
pub const MAX_PROMPT_NEWS: usize = 5;

pub const WEATHER_HEADING: &str = "## 今日天气概况";
pub const NEWS_HEADING: &str = "## 热点新闻聚焦";
pub const ADVICE_HEADING: &str = "## 生活工作建议";
pub const ANSWER_HEADING: &str = "## 直接回答";
pub const NOTES_HEADING: &str = "## 补充说明";

/// Meta-commentary the model is told never to produce
pub const SUMMARY_FORBIDDEN_PHRASES: &[&str] = &["根据以上信息", "基于天气和新闻", "现在构思具体内容"];
pub const DISCUSSION_FORBIDDEN_PHRASES: &[&str] =
    &["根据以上信息", "基于新闻内容", "让我想想", "首先我需要"];

/// What a prompt is built from; lives for one build.
#[derive(Debug, Clone, Copy)]
pub enum PromptContext<'a> {
    Summary {
        weather: &'a WeatherReport,
        news: &'a [NewsItem],
        /// Present when the news was ranked for a registered locale
        relevance: Option<LocaleRelevance<'a>>,
    },
    Discussion(DiscussionContext<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct LocaleRelevance<'a> {
    pub locale: &'a str,
    pub result: &'a RelevanceResult,
}

#[derive(Debug, Clone, Copy)]
pub struct DiscussionContext<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub question: &'a str,
    /// Full session history; only the most recent turns are rendered
    pub history: &'a [ConversationTurn],
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    history_window: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl PromptBuilder {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    pub fn build(&self, ctx: &PromptContext<'_>) -> String {
        match ctx {
            PromptContext::Summary {
                weather,
                news,
                relevance,
            } => self.summary_prompt(weather, news, relevance.as_ref()),
            PromptContext::Discussion(discussion) => self.discussion_prompt(discussion),
        }
    }

    pub fn summary_prompt(
        &self,
        weather: &WeatherReport,
        news: &[NewsItem],
        relevance: Option<&LocaleRelevance<'_>>,
    ) -> String {
        let weather_text = weather_block(weather);
        let news_heading = match relevance {
            Some(r) => format!("{}（{}相关）", NEWS_HEADING, r.locale),
            None => NEWS_HEADING.to_string(),
        };
        let news_label = if relevance.is_some() {
            "**相关热点新闻：**"
        } else {
            "**热点新闻：**"
        };
        let news_text = news_block(news_label, news);

        let mut prompt = String::new();
        match relevance {
            Some(r) => {
                let _ = writeln!(
                    prompt,
                    "\n请根据以下天气信息和地域相关热点新闻，生成一份简洁的汇总报告。"
                );
                let _ = write!(prompt, "{}", output_rules(&news_heading));
                let _ = writeln!(prompt, "11. 在热点新闻部分，重点突出与{}相关的新闻内容", r.locale);
                let _ = writeln!(prompt, "{}", relevance_block(r));
            }
            None => {
                let _ = writeln!(prompt, "\n请根据以下天气信息和热点新闻，生成一份简洁的汇总报告。");
                let _ = write!(prompt, "{}", output_rules(&news_heading));
            }
        }

        let _ = writeln!(prompt, "\n**输入信息：**\n");
        let _ = writeln!(prompt, "{}\n", weather_text);
        let _ = writeln!(prompt, "{}", news_text);
        let _ = writeln!(prompt, "请直接输出markdown格式的汇总报告：");
        prompt
    }

    pub fn discussion_prompt(&self, ctx: &DiscussionContext<'_>) -> String {
        let title = non_empty(ctx.title, UNKNOWN_TITLE);
        let content = non_empty(ctx.content, UNKNOWN);

        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "\n你是一名专业的新闻分析助手，请根据下面的新闻内容回答用户的问题。\n"
        );
        let _ = writeln!(prompt, "**新闻标题：**{}\n", title);
        let _ = writeln!(prompt, "**新闻内容：**\n{}\n", content);

        let window_start = ctx.history.len().saturating_sub(self.history_window);
        let window = &ctx.history[window_start..];
        if !window.is_empty() {
            let _ = writeln!(prompt, "**对话历史：**");
            for (round, turn) in window.iter().enumerate() {
                let _ = writeln!(prompt, "第{}轮对话：", round + 1);
                let _ = writeln!(prompt, "- 用户问题：{}", turn.question);
                let _ = writeln!(prompt, "- AI回答：{}\n", turn.answer);
            }
        }

        let _ = writeln!(prompt, "**当前问题：**{}\n", ctx.question.trim());
        let _ = writeln!(prompt, "**输出要求：**");
        let _ = writeln!(prompt, "1. 直接输出markdown格式的回答");
        let _ = writeln!(prompt, "2. 回答结构必须包含以下两个部分：");
        let _ = writeln!(prompt, "   - {}", ANSWER_HEADING);
        let _ = writeln!(prompt, "   - {}", NOTES_HEADING);
        let _ = writeln!(prompt, "3. 回答必须紧扣新闻内容，新闻中没有的信息请明确说明");
        let _ = writeln!(prompt, "4. 结合对话历史保持上下文连贯，不要重复之前已经回答过的内容");
        let _ = writeln!(prompt, "5. 总字数控制在{}字以内", DISCUSSION_CHAR_LIMIT);
        let _ = writeln!(prompt, "6. 不要包含任何分析过程、思维链、思考过程或过渡语句");
        let _ = writeln!(prompt, "7. 不要使用{}等表述", quoted(DISCUSSION_FORBIDDEN_PHRASES));
        let _ = writeln!(prompt, "8. 直接输出结果，不要解释或说明\n");
        let _ = writeln!(prompt, "请直接输出markdown格式的回答：");
        prompt
    }
}

fn output_rules(news_heading: &str) -> String {
    format!(
        "\n**输出要求：**
1. 直接输出markdown格式的汇总报告
2. 报告结构必须包含以下三个部分：
   - {weather}
   - {news}
   - {advice}
3. 语言简洁明了，突出重点信息
4. 总字数控制在{limit}字以内
5. 使用规范的markdown语法
6. 不要包含任何分析过程、思维链、思考过程或过渡语句
7. 不要使用{forbidden}等表述
8. 不要输出\"我会把这些内容组织成简洁的段落\"等思考过程
9. 直接输出结果，不要解释或说明
10. 不要包含任何模型思考、构思或分析步骤
",
        weather = WEATHER_HEADING,
        news = news_heading,
        advice = ADVICE_HEADING,
        limit = SUMMARY_CHAR_LIMIT,
        forbidden = quoted(SUMMARY_FORBIDDEN_PHRASES),
    )
}

fn relevance_block(r: &LocaleRelevance<'_>) -> String {
    format!(
        "\n**地域相关性分析：**
- 目标城市：{locale}
- 相关新闻数量：{relevant}/{total}
- 相关性比例：{rate:.1}%
- 筛选策略：优先展示与{locale}相关的热点新闻
",
        locale = r.locale,
        relevant = r.result.relevant_count,
        total = r.result.total_count,
        rate = r.result.relevance_rate * 100.0,
    )
}

fn weather_block(w: &WeatherReport) -> String {
    format!(
        "**天气信息：**
- 城市：{}
- 温度：{}°C
- 体感温度：{}°C
- 天气状况：{}
- 湿度：{}%
- 风速：{} km/h
- 风向：{}
- 能见度：{} km
- 气压：{} hPa
- 更新时间：{}",
        non_empty(&w.city, UNKNOWN),
        non_empty(&w.temperature, UNKNOWN),
        non_empty(&w.feels_like, UNKNOWN),
        non_empty(&w.description, UNKNOWN),
        non_empty(&w.humidity, UNKNOWN),
        non_empty(&w.wind_speed, UNKNOWN),
        non_empty(&w.wind_direction, UNKNOWN),
        non_empty(&w.visibility, UNKNOWN),
        non_empty(&w.pressure, UNKNOWN),
        non_empty(&w.update_time, UNKNOWN),
    )
}

fn news_block(label: &str, news: &[NewsItem]) -> String {
    let mut text = format!("{}\n", label);
    for (i, item) in news.iter().take(MAX_PROMPT_NEWS).enumerate() {
        let _ = writeln!(text, "{}. {}", i + 1, non_empty(&item.title, UNKNOWN_TITLE));
        let _ = writeln!(
            text,
            "   来源：{} | 分类：{}",
            non_empty(&item.source, UNKNOWN),
            non_empty(&item.category, UNKNOWN)
        );
        let _ = writeln!(text, "   摘要：{}\n", non_empty(&item.summary, NO_SUMMARY));
    }
    text
}

fn quoted(phrases: &[&str]) -> String {
    phrases
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join("、")
}

fn non_empty<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}
