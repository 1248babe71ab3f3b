use std::time::Duration;

use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::UpstreamError;
use crate::prompt::UNKNOWN;

const SERVICE: &str = "weather";
const DEFAULT_API_URL: &str = "http://wttr.in";
const MOCK_NOTE: &str = "模拟数据";

/// Current conditions for a city. Every field is a string so prompts can
/// interpolate them uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature: String,
    pub feels_like: String,
    pub humidity: String,
    pub description: String,
    pub wind_speed: String,
    pub wind_direction: String,
    pub visibility: String,
    pub pressure: String,
    pub update_time: String,
    /// Set when the upstream was unavailable and the values are placeholders
    #[serde(default)]
    pub is_mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl WeatherReport {
    /// Fixed stand-in used when the weather service is unavailable.
    pub fn mock(city: &str) -> Self {
        Self {
            city: city.to_string(),
            temperature: "22".into(),
            feels_like: "24".into(),
            humidity: "65".into(),
            description: "多云".into(),
            wind_speed: "15".into(),
            wind_direction: "东北".into(),
            visibility: "10".into(),
            pressure: "1013".into(),
            update_time: now_string(),
            is_mock: true,
            note: Some(MOCK_NOTE.into()),
        }
    }
}

/// Source of current weather conditions
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Never fails: an unavailable upstream yields [`WeatherReport::mock`].
    async fn get(&self, city: &str) -> WeatherReport;

    /// City names this provider knows how to look up
    fn supported_cities(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Chinese city name -> wttr.in lookup name
const CITY_NAMES: &[(&str, &str)] = &[
    ("北京", "Beijing"),
    ("上海", "Shanghai"),
    ("广州", "Guangzhou"),
    ("深圳", "Shenzhen"),
    ("杭州", "Hangzhou"),
    ("南京", "Nanjing"),
    ("武汉", "Wuhan"),
    ("成都", "Chengdu"),
    ("重庆", "Chongqing"),
    ("西安", "Xian"),
    ("天津", "Tianjin"),
    ("青岛", "Qingdao"),
    ("大连", "Dalian"),
    ("厦门", "Xiamen"),
    ("苏州", "Suzhou"),
    ("无锡", "Wuxi"),
    ("宁波", "Ningbo"),
    ("长沙", "Changsha"),
    ("郑州", "Zhengzhou"),
    ("济南", "Jinan"),
    ("福州", "Fuzhou"),
    ("合肥", "Hefei"),
    ("南昌", "Nanchang"),
    ("太原", "Taiyuan"),
    ("石家庄", "Shijiazhuang"),
    ("哈尔滨", "Harbin"),
    ("长春", "Changchun"),
    ("沈阳", "Shenyang"),
    ("呼和浩特", "Hohhot"),
    ("银川", "Yinchuan"),
    ("兰州", "Lanzhou"),
    ("西宁", "Xining"),
    ("乌鲁木齐", "Urumqi"),
    ("拉萨", "Lhasa"),
    ("昆明", "Kunming"),
    ("贵阳", "Guiyang"),
    ("南宁", "Nanning"),
    ("海口", "Haikou"),
    ("三亚", "Sanya"),
    ("珠海", "Zhuhai"),
    ("佛山", "Foshan"),
    ("东莞", "Dongguan"),
    ("徐州", "Xuzhou"),
    ("常州", "Changzhou"),
    ("温州", "Wenzhou"),
    ("泉州", "Quanzhou"),
];

/// Administrative suffixes dropped before lookup, longest first
const CITY_SUFFIXES: &[&str] = &["特别行政区", "自治区", "省", "市"];

/// Normalize a user-supplied city name to the name the weather API expects.
/// Unknown names pass through unchanged.
pub fn lookup_name(city: &str) -> String {
    let mut name = city.trim();
    for suffix in CITY_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            if !stripped.is_empty() {
                name = stripped;
                break;
            }
        }
    }
    CITY_NAMES
        .iter()
        .find(|(zh, _)| *zh == name)
        .map(|(_, en)| en.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// wttr.in JSON (`format=j1`) client
pub struct WttrWeatherClient {
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl WttrWeatherClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            client: Client::new(),
        }
    }

    pub fn from_config(cfg: Option<&common::WeatherConfig>) -> Self {
        let api_url = cfg
            .and_then(|c| c.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout = cfg.and_then(|c| c.timeout_seconds).unwrap_or(10);
        Self::new(api_url, timeout)
    }

    /// One attempt against the upstream; no retries.
    pub async fn fetch(&self, city: &str) -> Result<WeatherReport, UpstreamError> {
        let url = format!("{}/{}", self.base_url, lookup_name(city));
        let response = self
            .client
            .get(&url)
            .query(&[("format", "j1"), ("lang", "zh")])
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

        parse_current_condition(city, &payload)
    }
}

#[async_trait::async_trait]
impl WeatherProvider for WttrWeatherClient {
    async fn get(&self, city: &str) -> WeatherReport {
        match self.fetch(city).await {
            Ok(report) => {
                info!(city, temperature = %report.temperature, "weather fetched");
                report
            }
            Err(e) => {
                warn!(city, kind = e.kind(), error = %e, "weather unavailable, using mock data");
                WeatherReport::mock(city)
            }
        }
    }

    fn supported_cities(&self) -> Vec<String> {
        CITY_NAMES.iter().map(|(zh, _)| zh.to_string()).collect()
    }
}

/// Extract the first `current_condition` entry. Missing fields become `未知`;
/// a payload without any current condition is rejected.
pub fn parse_current_condition(city: &str, payload: &Value) -> Result<WeatherReport, UpstreamError> {
    let current = payload
        .get("current_condition")
        .and_then(|c| c.get(0))
        .ok_or_else(|| UpstreamError::Payload {
            service: SERVICE,
            message: "missing current_condition".into(),
        })?;

    let field = |key: &str| -> String {
        match current.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => UNKNOWN.to_string(),
        }
    };

    Ok(WeatherReport {
        city: city.to_string(),
        temperature: field("temp_C"),
        feels_like: field("FeelsLikeC"),
        humidity: field("humidity"),
        description: describe(current),
        wind_speed: field("windspeedKmph"),
        wind_direction: field("winddir16Point"),
        visibility: field("visibility"),
        pressure: field("pressure"),
        update_time: now_string(),
        is_mock: false,
        note: None,
    })
}

/// Prefer the Chinese description, then the English one, then a guess from the icon URL.
fn describe(current: &Value) -> String {
    let first_value = |key: &str| -> Option<String> {
        let entry = current.get(key)?.get(0)?;
        let text = match entry {
            Value::Object(_) => entry.get("value")?.as_str().map(str::to_string),
            Value::String(s) => Some(s.clone()),
            _ => None,
        };
        text.filter(|s| !s.trim().is_empty())
    };

    if let Some(desc) = first_value("lang_zh").or_else(|| first_value("weatherDesc")) {
        return desc;
    }
    let icon = first_value("weatherIconUrl").unwrap_or_default().to_lowercase();
    let guess = if icon.contains("sunny") {
        "晴天"
    } else if icon.contains("rainy") {
        "雨天"
    } else if icon.contains("snowy") {
        "雪天"
    } else {
        "多云"
    };
    guess.to_string()
}

fn now_string() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_strips_admin_suffix() {
        assert_eq!(lookup_name("北京市"), "Beijing");
        assert_eq!(lookup_name(" 上海 "), "Shanghai");
        assert_eq!(lookup_name("London"), "London");
        assert_eq!(lookup_name("市"), "市");
    }

    #[test]
    fn parse_prefers_chinese_description() {
        let payload = json!({
            "current_condition": [{
                "temp_C": "18",
                "FeelsLikeC": "17",
                "humidity": "40",
                "lang_zh": [{"value": "晴"}],
                "weatherDesc": [{"value": "Sunny"}],
                "windspeedKmph": "9",
                "winddir16Point": "NW",
                "visibility": "10",
                "pressure": "1020"
            }]
        });
        let report = parse_current_condition("北京", &payload).expect("parse");
        assert_eq!(report.description, "晴");
        assert_eq!(report.temperature, "18");
        assert!(!report.is_mock);
    }

    #[test]
    fn missing_fields_degrade_to_unknown() {
        let payload = json!({
            "current_condition": [{
                "temp_C": 5,
                "weatherIconUrl": [{"value": "http://x/wsymbol_rainy.png"}]
            }]
        });
        let report = parse_current_condition("北京", &payload).expect("parse");
        assert_eq!(report.temperature, "5");
        assert_eq!(report.humidity, UNKNOWN);
        assert_eq!(report.description, "雨天");
    }

    #[test]
    fn payload_without_condition_is_rejected() {
        let err = parse_current_condition("北京", &json!({"data": []})).unwrap_err();
        assert_eq!(err.kind(), "payload");
    }
}
