//! The two end-to-end flows: one-shot city summary and multi-turn news
//! discussion. Both gather their inputs, build a prompt, ask the model and
//! sanitize whatever comes back; a failed or missing model ends in a
//! deterministic template instead of an error.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DiscussError;
use crate::ingestion::{over_fetch_count, NewsSource, SinaNewsClient};
use crate::llm::summarizer::{complete_or_fallback, fallback_answer, fallback_summary, CompletionOrigin};
use crate::llm::{LlmProvider, LlmRequest};
use crate::locale::LocaleRegistry;
use crate::news::NewsItem;
use crate::prompt::{DiscussionContext, LocaleRelevance, PromptBuilder, DEFAULT_HISTORY_WINDOW};
use crate::ranking::{rank, RelevanceResult, MAX_RELEVANT};
use crate::sanitize::ResponseSanitizer;
use crate::scraping::{ContentExtractor, ExtractedArticle, ReadabilityExtractor};
use crate::sessions::{ConversationStore, DEFAULT_MAX_TURNS};
use crate::weather::{WeatherProvider, WeatherReport, WttrWeatherClient};

pub const DEFAULT_CITY: &str = "北京";
pub const DEFAULT_NEWS_LIMIT: usize = 10;
pub const DEFAULT_OVER_FETCH_FACTOR: usize = 2;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Items the summary flow would show before ranking
    pub news_limit: usize,
    pub over_fetch_factor: usize,
    /// Relevant items kept after ranking (capped at [`MAX_RELEVANT`])
    pub rank_limit: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            news_limit: DEFAULT_NEWS_LIMIT,
            over_fetch_factor: DEFAULT_OVER_FETCH_FACTOR,
            rank_limit: MAX_RELEVANT,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(cfg: Option<&common::NewsConfig>) -> Self {
        let defaults = Self::default();
        Self {
            news_limit: cfg.and_then(|c| c.limit).unwrap_or(defaults.news_limit),
            over_fetch_factor: cfg
                .and_then(|c| c.over_fetch_factor)
                .unwrap_or(defaults.over_fetch_factor),
            rank_limit: defaults.rank_limit,
        }
    }
}

/// Ranking statistics without the items themselves
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceSummary {
    pub locale: String,
    pub relevant_count: usize,
    pub total_count: usize,
    pub relevance_rate: f64,
    pub empty_match: bool,
}

impl RelevanceSummary {
    fn new(locale: &str, result: &RelevanceResult) -> Self {
        Self {
            locale: locale.to_string(),
            relevant_count: result.relevant_count,
            total_count: result.total_count,
            relevance_rate: result.relevance_rate,
            empty_match: result.empty_match,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub city: String,
    pub summary: String,
    pub weather: WeatherReport,
    pub news: Vec<NewsItem>,
    /// Present when `city` is a registered locale
    pub relevance: Option<RelevanceSummary>,
    pub origin: CompletionOrigin,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsListing {
    pub items: Vec<NewsItem>,
    pub relevance: Option<RelevanceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscussionReply {
    pub question: String,
    pub answer: String,
    pub news_title: String,
    pub news_content_length: usize,
    pub session_id: String,
    /// Turns held for the session after this one was recorded
    pub conversation_count: usize,
    pub origin: CompletionOrigin,
}

/// Progress of a single discussion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscussionStage {
    AwaitingQuestion,
    BuildingPrompt,
    InvokingModel,
    Sanitizing,
    Fallback,
    AppendingHistory,
    Done,
}

impl DiscussionStage {
    /// Stage that follows this one. `model_ok` only matters when leaving
    /// `InvokingModel`; `Done` has no successor.
    pub fn next(self, model_ok: bool) -> Option<Self> {
        use DiscussionStage::*;
        match self {
            AwaitingQuestion => Some(BuildingPrompt),
            BuildingPrompt => Some(InvokingModel),
            InvokingModel if model_ok => Some(Sanitizing),
            InvokingModel => Some(Fallback),
            Sanitizing | Fallback => Some(AppendingHistory),
            AppendingHistory => Some(Done),
            Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiscussionStage::AwaitingQuestion => "awaiting_question",
            DiscussionStage::BuildingPrompt => "building_prompt",
            DiscussionStage::InvokingModel => "invoking_model",
            DiscussionStage::Sanitizing => "sanitizing",
            DiscussionStage::Fallback => "fallback",
            DiscussionStage::AppendingHistory => "appending_history",
            DiscussionStage::Done => "done",
        }
    }
}

fn advance(stage: &mut DiscussionStage, model_ok: bool, session_id: &str) {
    if let Some(next) = stage.next(model_ok) {
        debug!(session_id, from = stage.as_str(), to = next.as_str(), "discussion stage");
        *stage = next;
    }
}

pub struct SummaryOrchestrator {
    weather: Arc<dyn WeatherProvider>,
    news: Arc<dyn NewsSource>,
    extractor: Arc<dyn ContentExtractor>,
    llm: Option<Arc<dyn LlmProvider>>,
    locales: LocaleRegistry,
    conversations: Arc<ConversationStore>,
    sanitizer: ResponseSanitizer,
    prompts: PromptBuilder,
    settings: OrchestratorSettings,
}

impl SummaryOrchestrator {
    /// Orchestrator with the built-in locale table, default sanitizer and a
    /// fresh conversation store. `llm == None` always answers with templates.
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        news: Arc<dyn NewsSource>,
        extractor: Arc<dyn ContentExtractor>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self {
            weather,
            news,
            extractor,
            llm,
            locales: LocaleRegistry::builtin(),
            conversations: Arc::new(ConversationStore::default()),
            sanitizer: ResponseSanitizer::default(),
            prompts: PromptBuilder::default(),
            settings: OrchestratorSettings::default(),
        }
    }

    /// Wire the production adapters from configuration.
    pub fn from_config(config: &common::Config) -> anyhow::Result<Self> {
        let conversation = config.conversation.as_ref();
        let sanitizer = ResponseSanitizer::from_config(config.sanitizer.as_ref())
            .context("invalid [sanitizer] configuration")?;
        let conversations = ConversationStore::new(
            conversation
                .and_then(|c| c.max_turns)
                .unwrap_or(DEFAULT_MAX_TURNS),
        );
        let prompts = PromptBuilder::new(
            conversation
                .and_then(|c| c.prompt_window)
                .unwrap_or(DEFAULT_HISTORY_WINDOW),
        );
        let locales = LocaleRegistry::from_config(&config.locales);
        info!(locales = locales.len(), "locale table loaded");

        Ok(Self::new(
            Arc::new(WttrWeatherClient::from_config(config.weather.as_ref())),
            Arc::new(SinaNewsClient::from_config(config.news.as_ref())),
            Arc::new(ReadabilityExtractor::from_config(config.scraping.as_ref())),
            crate::llm::provider_from_config(config),
        )
        .with_locales(locales)
        .with_conversations(Arc::new(conversations))
        .with_sanitizer(sanitizer)
        .with_prompt_builder(prompts)
        .with_settings(OrchestratorSettings::from_config(config.news.as_ref())))
    }

    pub fn with_locales(mut self, locales: LocaleRegistry) -> Self {
        self.locales = locales;
        self
    }

    pub fn with_conversations(mut self, conversations: Arc<ConversationStore>) -> Self {
        self.conversations = conversations;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: ResponseSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn locales(&self) -> &LocaleRegistry {
        &self.locales
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn model_name(&self) -> Option<String> {
        self.llm.as_deref().map(|m| m.model_name())
    }

    /// Switch the backend model; `Ok(false)` when it is not offered or no
    /// backend is configured.
    pub async fn set_model(&self, model: &str) -> anyhow::Result<bool> {
        match self.llm.as_deref() {
            Some(llm) => llm.set_model(model).await,
            None => Ok(false),
        }
    }

    /// Models offered by the backend; empty when none is configured.
    pub async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        match self.llm.as_deref() {
            Some(llm) => llm.list_models().await,
            None => Ok(Vec::new()),
        }
    }

    pub fn supported_cities(&self) -> Vec<String> {
        self.weather.supported_cities()
    }

    pub async fn weather(&self, city: &str) -> WeatherReport {
        self.weather.get(normalize_city(city)).await
    }

    /// Current headlines, ranked when `city` is a registered locale.
    pub async fn news(&self, city: Option<&str>, limit: usize) -> NewsListing {
        let limit = limit.max(1);
        let locale = city.and_then(|c| self.locales.get(c));
        let Some(locale) = locale else {
            let items = self.news.fetch(limit).await;
            return NewsListing {
                items,
                relevance: None,
            };
        };

        let pool = self
            .news
            .fetch(over_fetch_count(limit, self.settings.over_fetch_factor))
            .await;
        let result = rank(&pool, Some(locale), limit);
        NewsListing {
            relevance: Some(RelevanceSummary::new(locale.name(), &result)),
            items: result.ranked_items,
        }
    }

    pub async fn news_content(&self, url: &str) -> ExtractedArticle {
        self.extractor.extract(url.trim()).await
    }

    pub async fn generate_summary(&self, city: &str) -> SummaryReport {
        let city = normalize_city(city);
        let locale = self.locales.get(city);
        let fetch_count =
            over_fetch_count(self.settings.news_limit, self.settings.over_fetch_factor);

        let (weather, pool) = tokio::join!(self.weather.get(city), self.news.fetch(fetch_count));
        let result = rank(&pool, locale, self.settings.rank_limit);

        let relevance = locale.map(|l| LocaleRelevance {
            locale: l.name(),
            result: &result,
        });
        let prompt = self
            .prompts
            .summary_prompt(&weather, &result.ranked_items, relevance.as_ref());

        let completion = complete_or_fallback(self.llm.as_deref(), LlmRequest::new(prompt), || {
            fallback_summary(&weather, &result.ranked_items, locale.map(|l| l.name()))
        })
        .await;
        let summary = self.sanitizer.clean(&completion.text);

        info!(
            city,
            news = result.ranked_items.len(),
            relevant = result.relevant_count,
            origin = ?completion.origin,
            "summary generated"
        );

        SummaryReport {
            city: city.to_string(),
            summary,
            relevance: locale.map(|l| RelevanceSummary::new(l.name(), &result)),
            news: result.ranked_items,
            weather,
            origin: completion.origin,
        }
    }

    /// Answer `question` about the article at `url` in the context of the
    /// session's recent turns, and record the turn. A blank `session_id`
    /// starts a new session.
    pub async fn discuss(
        &self,
        url: &str,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<DiscussionReply, DiscussError> {
        let url = url.trim();
        let question = question.trim();
        if url.is_empty() {
            return Err(DiscussError::InvalidInput("url"));
        }
        if question.is_empty() {
            return Err(DiscussError::InvalidInput("question"));
        }
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut stage = DiscussionStage::AwaitingQuestion;

        let article = self.extractor.extract(url).await;
        if !article.success {
            return Err(DiscussError::ContentUnavailable {
                url: url.to_string(),
            });
        }

        advance(&mut stage, true, &session_id);
        let history = self
            .conversations
            .recent(&session_id, self.prompts.history_window())
            .await;
        let prompt = self.prompts.discussion_prompt(&DiscussionContext {
            title: &article.title,
            content: &article.content,
            question,
            history: &history,
        });

        advance(&mut stage, true, &session_id);
        let completion = complete_or_fallback(self.llm.as_deref(), LlmRequest::new(prompt), || {
            fallback_answer(&article.title, &article.content, question)
        })
        .await;

        advance(
            &mut stage,
            completion.origin == CompletionOrigin::Model,
            &session_id,
        );
        let answer = self.sanitizer.clean(&completion.text);

        advance(&mut stage, true, &session_id);
        let conversation_count = self
            .conversations
            .append(&session_id, question, answer.clone())
            .await;

        advance(&mut stage, true, &session_id);
        info!(
            session_id = %session_id,
            conversation_count,
            origin = ?completion.origin,
            "discussion answered"
        );

        Ok(DiscussionReply {
            question: question.to_string(),
            answer,
            news_title: article.title,
            news_content_length: article.length,
            session_id,
            conversation_count,
            origin: completion.origin,
        })
    }

    /// Forget a session's history. Returns whether it existed.
    pub async fn clear_conversation(&self, session_id: &str) -> bool {
        self.conversations.clear(session_id.trim()).await
    }
}

fn normalize_city(city: &str) -> &str {
    let city = city.trim();
    if city.is_empty() {
        DEFAULT_CITY
    } else {
        city
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_walks_through_sanitizing() {
        let mut stage = DiscussionStage::AwaitingQuestion;
        let mut seen = vec![stage];
        while let Some(next) = stage.next(true) {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                DiscussionStage::AwaitingQuestion,
                DiscussionStage::BuildingPrompt,
                DiscussionStage::InvokingModel,
                DiscussionStage::Sanitizing,
                DiscussionStage::AppendingHistory,
                DiscussionStage::Done,
            ]
        );
    }

    #[test]
    fn model_failure_routes_to_fallback() {
        assert_eq!(
            DiscussionStage::InvokingModel.next(false),
            Some(DiscussionStage::Fallback)
        );
        assert_eq!(
            DiscussionStage::Fallback.next(false),
            Some(DiscussionStage::AppendingHistory)
        );
        assert_eq!(DiscussionStage::Done.next(true), None);
    }

    #[test]
    fn blank_city_defaults() {
        assert_eq!(normalize_city("  "), DEFAULT_CITY);
        assert_eq!(normalize_city(" 上海 "), "上海");
    }

    #[test]
    fn settings_read_news_section() {
        let cfg = common::NewsConfig {
            limit: Some(6),
            over_fetch_factor: Some(3),
            ..Default::default()
        };
        let s = OrchestratorSettings::from_config(Some(&cfg));
        assert_eq!(s.news_limit, 6);
        assert_eq!(s.over_fetch_factor, 3);
        assert_eq!(s.rank_limit, MAX_RELEVANT);
    }
}
