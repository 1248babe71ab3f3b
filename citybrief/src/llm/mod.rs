use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Language model backend behind the summary and discussion flows
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single non-streaming completion for a prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Model name requests are sent to
    fn model_name(&self) -> String;

    /// Models the backend offers. Backends without a listing endpoint report
    /// only their configured model.
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![self.model_name()])
    }

    /// Route later requests to `model`. `Ok(false)` when the backend does not
    /// offer it; the current model is then left unchanged.
    async fn set_model(&self, model: &str) -> Result<bool> {
        Ok(self.model_name() == model)
    }
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    /// Prompt with every option left to the provider defaults
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            timeout_seconds: None,
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod remote;
pub mod summarizer;

/// Model backend selected by `[llm]`. `adapter = "none"` (or any adapter
/// other than `remote`) disables the model and every answer is templated.
pub fn provider_from_config(config: &common::Config) -> Option<Arc<dyn LlmProvider>> {
    let Some(remote_cfg) = config.remote_llm() else {
        let adapter = config
            .llm
            .as_ref()
            .and_then(|l| l.adapter.as_deref())
            .unwrap_or("remote");
        info!(adapter, "LLM disabled, answers will use templates");
        return None;
    };

    if let Some(var) = remote_cfg.api_key_env.as_deref() {
        if std::env::var(var).is_err() {
            warn!(env = var, "LLM API key env var not set, sending requests without a key");
        }
    }

    let provider = remote::RemoteLlmProvider::from_config(remote_cfg);
    info!(
        model = %provider.model_name(),
        api_url = remote_cfg.api_url.as_deref().unwrap_or(remote::DEFAULT_API_URL),
        "LLM provider initialized"
    );
    Some(Arc::new(provider))
}
