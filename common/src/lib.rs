/*!
common/src/lib.rs

Shared configuration types for citybrief.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default + override layering
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g. "0.0.0.0")
    pub address: Option<String>,
    pub port: Option<u16>,
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key. Local endpoints
    /// such as Ollama need none.
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// LLM top-level config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote", "none"
    pub remote: Option<RemoteLlmConfig>,
}

/// Weather upstream (wttr.in compatible)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub api_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// News feed upstream and ranking pool sizing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsConfig {
    pub api_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Number of items the summary flow wants to show
    pub limit: Option<usize>,
    /// Multiplier applied to `limit` when fetching, so the ranker has a pool to select from
    pub over_fetch_factor: Option<usize>,
}

/// Article page extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapingConfig {
    pub timeout_seconds: Option<u64>,
    pub max_content_chars: Option<usize>,
}

/// Conversation history sizing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Turns kept per session before the oldest are evicted
    pub max_turns: Option<usize>,
    /// Turns rendered into a discussion prompt
    pub prompt_window: Option<usize>,
}

/// Reasoning-leak filter patterns. Empty/missing lists fall back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanitizerConfig {
    #[serde(default)]
    pub think_tags: Vec<String>,
    #[serde(default)]
    pub lead_in_phrases: Vec<String>,
}

/// A ranking locale: canonical name plus the keywords that mark an item as local news
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub llm: Option<LlmConfig>,
    pub weather: Option<WeatherConfig>,
    pub news: Option<NewsConfig>,
    pub scraping: Option<ScrapingConfig>,
    pub conversation: Option<ConversationConfig>,
    pub sanitizer: Option<SanitizerConfig>,
    /// Replaces the built-in locale table when non-empty
    #[serde(default)]
    pub locales: Vec<LocaleConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await.with_context(|| {
                    format!("Failed to read override config: {}", path.display())
                })?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Remote LLM section, if the remote adapter is selected
    pub fn remote_llm(&self) -> Option<&RemoteLlmConfig> {
        let llm = self.llm.as_ref()?;
        match llm.adapter.as_deref() {
            Some("remote") | None => llm.remote.as_ref(),
            _ => None,
        }
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_config_parses() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert!(cfg.llm.is_none());
        assert!(cfg.locales.is_empty());
    }

    #[test]
    fn config_from_string() {
        let toml = r#"
            [server]
            port = 5000

            [llm]
            adapter = "remote"

            [llm.remote]
            api_url = "http://localhost:11434/v1/chat/completions"
            model = "qwen2.5:7b"
            timeout_seconds = 60

            [news]
            limit = 10
            over_fetch_factor = 2

            [[locales]]
            name = "北京"
            keywords = ["首都", "海淀"]
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.server.as_ref().and_then(|s| s.port), Some(5000));
        let remote = cfg.remote_llm().expect("remote llm");
        assert_eq!(remote.model.as_deref(), Some("qwen2.5:7b"));
        assert_eq!(remote.timeout_seconds, Some(60));
        assert_eq!(cfg.locales.len(), 1);
        assert_eq!(cfg.locales[0].keywords, vec!["首都", "海淀"]);
    }

    #[test]
    fn disabled_adapter_hides_remote() {
        let toml = r#"
            [llm]
            adapter = "none"

            [llm.remote]
            model = "qwen2.5:7b"
        "#;
        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert!(cfg.remote_llm().is_none());
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        fs::write(
            &default_path,
            r#"
            [weather]
            api_url = "http://wttr.in"
            timeout_seconds = 10

            [conversation]
            max_turns = 10
            "#,
        )
        .expect("write default");
        fs::write(
            &override_path,
            r#"
            [weather]
            timeout_seconds = 3
            "#,
        )
        .expect("write override");

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load config");

        let weather = cfg.weather.expect("weather section");
        assert_eq!(weather.api_url.as_deref(), Some("http://wttr.in"));
        assert_eq!(weather.timeout_seconds, Some(3));
        assert_eq!(cfg.conversation.and_then(|c| c.max_turns), Some(10));
    }

    #[tokio::test]
    async fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let cfg = Config::load_with_defaults(Some(&missing), None)
            .await
            .expect("load config");
        assert!(cfg.weather.is_none());
    }
}
