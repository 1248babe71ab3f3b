use std::time::Duration;

use chrono::{Local, TimeZone};
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::UpstreamError;
use crate::news::NewsItem;

const SERVICE: &str = "news feed";
const DEFAULT_API_URL: &str = "https://feed.mix.sina.com.cn/api/roll/get";
const SOURCE_NAME: &str = "新浪新闻";
const DEFAULT_CATEGORY: &str = "热点";
const ROLL_PAGE_URL: &str = "https://news.sina.com.cn/roll/#pageid=153&lid=2509&num=1&page=1";

/// Feed of current headlines.
///
/// Callers that rank the result should ask for more than they intend to show
/// (see [`over_fetch_count`]): ranking can only select from what was fetched.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// Never fails: an unavailable feed yields [`mock_news`].
    async fn fetch(&self, count: usize) -> Vec<NewsItem>;
}

/// Pool size to fetch when `limit` items will be shown after ranking.
pub fn over_fetch_count(limit: usize, factor: usize) -> usize {
    limit.saturating_mul(factor.max(1))
}

/// Sina rolling news JSON API client
pub struct SinaNewsClient {
    api_url: String,
    timeout: Duration,
    client: Client,
}

impl SinaNewsClient {
    pub fn new(api_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            api_url: api_url.into(),
            timeout: Duration::from_secs(timeout_secs),
            client: Client::new(),
        }
    }

    pub fn from_config(cfg: Option<&common::NewsConfig>) -> Self {
        let api_url = cfg
            .and_then(|c| c.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(api_url, cfg.and_then(|c| c.timeout_seconds).unwrap_or(10))
    }

    /// One attempt against the upstream; no retries.
    pub async fn fetch_feed(&self, count: usize) -> Result<Vec<NewsItem>, UpstreamError> {
        let num = count.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("pageid", "153"),
                ("lid", "2509"),
                ("num", num.as_str()),
                ("page", "1"),
            ])
            .header("User-Agent", "citybrief/0.1.0")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, self.timeout, e))?;

        let mut items = parse_feed(&payload)?;
        items.truncate(count);
        Ok(items)
    }
}

#[async_trait::async_trait]
impl NewsSource for SinaNewsClient {
    async fn fetch(&self, count: usize) -> Vec<NewsItem> {
        match self.fetch_feed(count).await {
            Ok(items) => {
                info!(requested = count, fetched = items.len(), "news feed fetched");
                items
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "news feed unavailable, using mock news");
                mock_news(count)
            }
        }
    }
}

/// Parse the roll API envelope. A non-zero status code is an upstream
/// failure; malformed items degrade field by field.
pub fn parse_feed(payload: &Value) -> Result<Vec<NewsItem>, UpstreamError> {
    let result = payload.get("result").ok_or_else(|| UpstreamError::Payload {
        service: SERVICE,
        message: "missing result".into(),
    })?;

    let code = result
        .pointer("/status/code")
        .and_then(Value::as_i64)
        .unwrap_or(-1);
    if code != 0 {
        return Err(UpstreamError::Payload {
            service: SERVICE,
            message: format!("status code {}", code),
        });
    }

    let items = result
        .get("data")
        .and_then(Value::as_array)
        .map(|data| data.iter().map(parse_item).collect())
        .unwrap_or_default();
    Ok(items)
}

fn parse_item(raw: &Value) -> NewsItem {
    let text = |key: &str| -> String {
        match raw.get(key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    };

    let mut url = text("url");
    if url.is_empty() || url == "#" {
        url = ROLL_PAGE_URL.to_string();
    }

    let category = Some(text("category"))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    NewsItem {
        url,
        summary: text("intro"),
        source: SOURCE_NAME.to_string(),
        publish_time: format_ctime(&text("ctime")),
        category,
        ..NewsItem::new(text("title"), "")
    }
}

/// Render a unix-seconds `ctime` as local time; anything else is kept verbatim.
fn format_ctime(ctime: &str) -> String {
    ctime
        .parse::<i64>()
        .ok()
        .and_then(|secs| Local.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ctime.to_string())
}

/// Deterministic stand-in used when the feed is unavailable: at most five items.
pub fn mock_news(count: usize) -> Vec<NewsItem> {
    const MOCK: &[(&str, &str, &str, &str, &str)] = &[
        (
            "人工智能技术发展迅速，ChatGPT引领AI革命",
            "https://news.sina.com.cn/tech/2024/01/15/ai-development.html",
            "人工智能技术在全球范围内快速发展，ChatGPT等大语言模型引领AI革命，推动各行业数字化转型。",
            "2024-01-15 10:30:00",
            "科技",
        ),
        (
            "新能源汽车销量持续增长，绿色出行成为趋势",
            "https://news.sina.com.cn/auto/2024/01/15/ev-sales-growth.html",
            "新能源汽车市场持续火爆，销量大幅增长，绿色出行理念深入人心，推动汽车产业转型升级。",
            "2024-01-15 09:15:00",
            "汽车",
        ),
        (
            "北京科技创新中心建设加速推进",
            "https://news.sina.com.cn/tech/2024/01/15/beijing-innovation.html",
            "北京作为全国科技创新中心，正在加速推进各项创新项目，吸引全球顶尖人才和科技企业。",
            "2024-01-15 08:45:00",
            "科技",
        ),
        (
            "上海自贸区深化改革，营商环境持续优化",
            "https://news.sina.com.cn/finance/2024/01/15/shanghai-ftz.html",
            "上海自贸区深化改革措施不断，营商环境持续优化，吸引更多外资企业投资兴业。",
            "2024-01-15 08:20:00",
            "财经",
        ),
        (
            "广州数字经济蓬勃发展，智慧城市建设提速",
            "https://news.sina.com.cn/tech/2024/01/15/guangzhou-digital.html",
            "广州数字经济蓬勃发展，智慧城市建设全面提速，为城市发展注入新动能。",
            "2024-01-15 07:55:00",
            "科技",
        ),
    ];

    MOCK.iter()
        .take(count)
        .map(|(title, url, summary, publish_time, category)| NewsItem {
            url: url.to_string(),
            source: SOURCE_NAME.to_string(),
            publish_time: publish_time.to_string(),
            category: category.to_string(),
            ..NewsItem::new(*title, *summary)
        })
        .collect()
}
