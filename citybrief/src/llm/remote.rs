use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
use crate::error::UpstreamError;

const SERVICE: &str = "model";
pub const DEFAULT_API_URL: &str = "http://localhost:11434/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "qwen2.5:7b";

/// Remote LLM provider using OpenAI-compatible HTTP API.
///
/// `base_url` is the chat completions endpoint itself (Ollama serves one at
/// `/v1/chat/completions`); the model listing URL is derived from it.
pub struct RemoteLlmProvider {
    base_url: String,
    api_key: Option<String>,
    model: RwLock<String>,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: RwLock::new(model.into()),
            default_timeout: Duration::from_secs(60),
            default_max_tokens: 800,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(mut self, timeout_secs: u64, max_tokens: usize, temperature: f32) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    /// Build from `[llm.remote]`; the API key is read from the environment
    /// variable named by `api_key_env`.
    pub fn from_config(cfg: &common::RemoteLlmConfig) -> Self {
        let api_key = cfg
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        Self::new(
            cfg.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key,
            cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )
        .with_defaults(
            cfg.timeout_seconds.unwrap_or(60),
            cfg.max_tokens.unwrap_or(800),
            cfg.temperature.unwrap_or(0.7),
        )
    }

    /// e.g. http://localhost:11434/v1/chat/completions -> http://localhost:11434/v1/models
    pub fn models_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match base.strip_suffix("/chat/completions") {
            Some(root) => format!("{}/models", root),
            None => format!("{}/models", base),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    async fn send_chat(
        &self,
        body: &OpenAiRequest,
        timeout: Duration,
    ) -> Result<OpenAiResponse, UpstreamError> {
        let response = self
            .authorized(self.client.post(&self.base_url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, timeout, e))
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let req_body = OpenAiRequest {
            model: self.model_name(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt,
            }],
            max_tokens: Some(request.max_tokens.unwrap_or(self.default_max_tokens)),
            temperature: Some(request.temperature.unwrap_or(self.default_temperature)),
            stream: false,
        };

        // The deadline covers the whole exchange, body included
        let resp_body = tokio::time::timeout(timeout, self.send_chat(&req_body, timeout))
            .await
            .map_err(|_| UpstreamError::Timeout {
                service: SERVICE,
                timeout,
            })??;

        let choice = resp_body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Payload {
                service: SERVICE,
                message: "response has no choices".into(),
            })?;

        let usage = resp_body
            .usage
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content,
            usage,
            model: resp_body.model.unwrap_or_else(|| req_body.model.clone()),
        })
    }

    fn model_name(&self) -> String {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn set_model(&self, model: &str) -> Result<bool> {
        let available = self.list_models().await?;
        if !available.iter().any(|m| m == model) {
            warn!(model, "requested model is not offered by the backend");
            return Ok(false);
        }
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = model.to_string();
        info!(model, "LLM model switched");
        Ok(true)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.models_url();
        let timeout = self.default_timeout;
        let response = self
            .authorized(self.client.get(&url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let listing: ModelList = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, timeout, e))?;
        Ok(listing.data.into_iter().map(|m| m.id).collect())
    }
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}
