use std::io::Cursor;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::UpstreamError;

const SERVICE: &str = "article page";
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 5000;
const TRUNCATION_MARKER: &str = "...";

/// Main text of a news page, ready to be placed in a prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedArticle {
    pub success: bool,
    pub url: String,
    pub title: String,
    pub content: String,
    /// Length of `content` in characters
    pub length: usize,
}

impl ExtractedArticle {
    pub fn failed(url: &str) -> Self {
        Self {
            success: false,
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            length: 0,
        }
    }
}

/// Turns a news URL into article text
#[async_trait::async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Never fails; unreachable or empty pages give `success == false`.
    async fn extract(&self, url: &str) -> ExtractedArticle;
}

/// Fetches the page and runs readability, falling back to common article selectors
pub struct ReadabilityExtractor {
    timeout: Duration,
    max_chars: usize,
    client: Client,
}

impl ReadabilityExtractor {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            max_chars,
            client: Client::new(),
        }
    }

    pub fn from_config(cfg: Option<&common::ScrapingConfig>) -> Self {
        Self::new(
            cfg.and_then(|c| c.timeout_seconds).unwrap_or(15),
            cfg.and_then(|c| c.max_content_chars)
                .unwrap_or(DEFAULT_MAX_CONTENT_CHARS),
        )
    }

    async fn fetch_html(&self, url: &str) -> Result<String, UpstreamError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", "citybrief/0.1.0")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: String::new(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, self.timeout, e))
    }
}

#[async_trait::async_trait]
impl ContentExtractor for ReadabilityExtractor {
    async fn extract(&self, url: &str) -> ExtractedArticle {
        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, kind = e.kind(), error = %e, "scraping: article fetch failed");
                return ExtractedArticle::failed(url);
            }
        };

        let (title, text) = extract_from_html(&html, url);
        let content = truncate_content(&strip_boilerplate(&text), self.max_chars);
        if content.is_empty() {
            warn!(url, "scraping: no article text found");
            return ExtractedArticle::failed(url);
        }

        let length = content.chars().count();
        info!(url, length, "scraping: extracted article text");
        ExtractedArticle {
            success: true,
            url: url.to_string(),
            title,
            content,
            length,
        }
    }
}

const CONTENT_SELECTORS: &[&str] = &[
    "#artibody",
    ".article",
    "article",
    "main",
    ".post-content",
    ".entry-content",
    "#content",
];

/// Title and plain text of the main content of `html`.
pub fn extract_from_html(html: &str, url: &str) -> (String, String) {
    let document = Html::parse_document(html);
    let page_title = select_text(&document, "h1").or_else(|| select_text(&document, "title"));

    if let Ok(url_obj) = url::Url::parse(url) {
        let mut reader = Cursor::new(html.as_bytes());
        match readability::extractor::extract(&mut reader, &url_obj) {
            Ok(product) => {
                let text = html_to_text(&product.content).unwrap_or(product.text);
                if !text.trim().is_empty() {
                    let title = if product.title.trim().is_empty() {
                        page_title.unwrap_or_default()
                    } else {
                        product.title.trim().to_string()
                    };
                    return (title, text);
                }
            }
            Err(e) => warn!(url, "scraping: readability failed: {}", e),
        }
    }

    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                if let Some(text) = html_to_text(&element.html()) {
                    if !text.trim().is_empty() {
                        return (page_title.unwrap_or_default(), text);
                    }
                }
            }
        }
    }

    // Last resort: every paragraph on the page
    let mut paragraphs = String::new();
    if let Ok(p_selector) = Selector::parse("p") {
        for element in document.select(&p_selector) {
            paragraphs.push_str(&element.html());
            paragraphs.push('\n');
        }
    }
    let text = html_to_text(&paragraphs).unwrap_or_default();
    (page_title.unwrap_or_default(), text)
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn html_to_text(html: &str) -> Option<String> {
    html2text::from_read(html.as_bytes(), 10_000).ok()
}

static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // bracketed editor credits: （责任编辑：张三）
        r"[（(]\s*(?:责任编辑|编辑|记者|作者)[:：][^）)]*[）)]",
        // whole byline / credit lines
        r"(?m)^[ \t]*(?:责任编辑|编辑|记者|作者|来源|原标题|文/|图/)[:：]?.*$",
        // share prompts
        r"(?m)^.*(?:分享到|点击分享|扫描二维码|扫码关注|关注我们|打开APP|打开客户端).*$",
        r"(?im)^.*(?:share this article|share on (?:facebook|twitter)|follow us on).*$",
        r"(?im)^[ \t]*(?:editor|editing by|reporting by)[ \t]*:.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("boilerplate regex"))
    .collect()
});

static EXTRA_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank line regex"));

/// Remove bylines, editor credits and share prompts.
pub fn strip_boilerplate(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in BOILERPLATE.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    EXTRA_BLANK_LINES
        .replace_all(&cleaned, "\n\n")
        .trim()
        .to_string()
}

/// Cap `text` at `max_chars` characters, marking the cut with `...`.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bylines_and_share_prompts() {
        let text = "新华社北京电 今日发布新规。\n\n责任编辑：张三\n分享到：微博 微信\n正文继续（编辑：李四）。";
        let cleaned = strip_boilerplate(text);
        assert_eq!(cleaned, "新华社北京电 今日发布新规。\n\n正文继续。");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "北京".repeat(10);
        let truncated = truncate_content(&text, 5);
        assert_eq!(truncated, "北京北京北...");
        assert_eq!(truncate_content("短文", 5), "短文");
    }

    #[test]
    fn selector_fallback_finds_sina_body() {
        let html = r#"<html><head><title>页面标题</title></head>
            <body><h1>新闻标题</h1><div id="artibody"><p>第一段内容。</p><p>第二段内容。</p></div></body></html>"#;
        let (title, text) = extract_from_html(html, "not a url");
        assert_eq!(title, "新闻标题");
        assert!(text.contains("第一段内容"));
        assert!(text.contains("第二段内容"));
    }
}
