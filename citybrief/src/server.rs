use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::figment::Figment;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, post, routes, Build, Request, Rocket, State};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::Config;

use crate::error::{failure_kind, DiscussError};
use crate::scraping::ExtractedArticle;
use crate::summary::{
    DiscussionReply, NewsListing, SummaryOrchestrator, SummaryReport, DEFAULT_CITY,
    DEFAULT_NEWS_LIMIT,
};
use crate::weather::WeatherReport;

/// Upper bound for `/api/news?limit=`
const MAX_NEWS_LIMIT: usize = 50;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub orchestrator: Arc<SummaryOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<SummaryOrchestrator>) -> Self {
        Self {
            started_at: Utc::now(),
            orchestrator,
        }
    }
}

/// JSON envelope shared by every `/api` route
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

type ApiError = Custom<Json<ApiResponse<()>>>;
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn api_error(status: Status, message: impl Into<String>) -> ApiError {
    Custom(
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    model: Option<String>,
    locales: usize,
    sessions: usize,
}

#[derive(Serialize)]
struct CurrentModel {
    model: Option<String>,
}

#[derive(Deserialize)]
struct SetModelRequest {
    model_name: Option<String>,
}

/// `/api/set-model` answers with a message rather than a data payload.
#[derive(Serialize)]
struct SetModelResponse {
    success: bool,
    message: String,
}

/// Body of `POST /api/discuss-news`. Fields are optional so that a missing
/// one is reported in the envelope rather than by Rocket's body guard.
#[derive(Debug, Deserialize)]
pub struct DiscussRequest {
    pub url: Option<String>,
    pub question: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    session_id: String,
    cleared: bool,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let orchestrator = &state.orchestrator;
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        model: orchestrator.model_name(),
        locales: orchestrator.locales().len(),
        sessions: orchestrator.conversations().session_count().await,
    })
}

#[get("/api/cities")]
async fn cities(state: &State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    ApiResponse::ok(state.orchestrator.supported_cities())
}

#[get("/api/locales")]
async fn locales(state: &State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    let names = state
        .orchestrator
        .locales()
        .names()
        .map(str::to_string)
        .collect();
    ApiResponse::ok(names)
}

#[get("/api/weather?<city>")]
async fn weather(state: &State<AppState>, city: Option<String>) -> Json<ApiResponse<WeatherReport>> {
    let city = city.unwrap_or_else(|| DEFAULT_CITY.to_string());
    ApiResponse::ok(state.orchestrator.weather(&city).await)
}

#[get("/api/news?<limit>&<city>")]
async fn news(
    state: &State<AppState>,
    limit: Option<usize>,
    city: Option<String>,
) -> Json<ApiResponse<NewsListing>> {
    let limit = limit.unwrap_or(DEFAULT_NEWS_LIMIT).clamp(1, MAX_NEWS_LIMIT);
    let city = city.as_deref().map(str::trim).filter(|c| !c.is_empty());
    ApiResponse::ok(state.orchestrator.news(city, limit).await)
}

#[get("/api/news-content?<url>")]
async fn news_content(state: &State<AppState>, url: Option<String>) -> ApiResult<ExtractedArticle> {
    let url = url.unwrap_or_default();
    if url.trim().is_empty() {
        return Err(api_error(Status::BadRequest, "missing required parameter: url"));
    }
    let article = state.orchestrator.news_content(&url).await;
    if !article.success {
        return Err(api_error(
            Status::BadRequest,
            format!("could not fetch news content from {}", url.trim()),
        ));
    }
    Ok(ApiResponse::ok(article))
}

#[get("/api/summary?<city>")]
async fn summary(state: &State<AppState>, city: Option<String>) -> Json<ApiResponse<SummaryReport>> {
    let city = city.unwrap_or_else(|| DEFAULT_CITY.to_string());
    ApiResponse::ok(state.orchestrator.generate_summary(&city).await)
}

#[post("/api/discuss-news", format = "json", data = "<body>")]
async fn discuss_news(state: &State<AppState>, body: Json<DiscussRequest>) -> ApiResult<DiscussionReply> {
    let body = body.into_inner();
    state
        .orchestrator
        .discuss(
            body.url.as_deref().unwrap_or_default(),
            body.question.as_deref().unwrap_or_default(),
            body.session_id.as_deref(),
        )
        .await
        .map(ApiResponse::ok)
        .map_err(|e| {
            match &e {
                DiscussError::InvalidInput(field) => warn!(field = *field, "discussion rejected"),
                DiscussError::ContentUnavailable { url } => {
                    warn!(url = %url, "discussion rejected: no article content")
                }
            }
            api_error(Status::BadRequest, e.to_string())
        })
}

#[post("/api/clear-conversation", format = "json", data = "<body>")]
async fn clear_conversation(state: &State<AppState>, body: Json<ClearRequest>) -> ApiResult<ClearResponse> {
    let session_id = body
        .into_inner()
        .session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| api_error(Status::BadRequest, "missing required parameter: session_id"))?;
    let cleared = state.orchestrator.clear_conversation(&session_id).await;
    info!(session_id = %session_id, cleared, "conversation cleared");
    Ok(ApiResponse::ok(ClearResponse { session_id, cleared }))
}

#[get("/api/models")]
async fn models(state: &State<AppState>) -> ApiResult<Vec<String>> {
    match state.orchestrator.list_models().await {
        Ok(models) => Ok(ApiResponse::ok(models)),
        Err(e) => {
            warn!(kind = failure_kind(&e), error = %e, "model listing failed");
            Err(api_error(Status::BadGateway, e.to_string()))
        }
    }
}

#[get("/api/current-model")]
async fn current_model(state: &State<AppState>) -> Json<ApiResponse<CurrentModel>> {
    ApiResponse::ok(CurrentModel {
        model: state.orchestrator.model_name(),
    })
}

#[post("/api/set-model", format = "json", data = "<body>")]
async fn set_model(
    state: &State<AppState>,
    body: Json<SetModelRequest>,
) -> Result<Json<SetModelResponse>, ApiError> {
    let model = body
        .into_inner()
        .model_name
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| api_error(Status::BadRequest, "missing required parameter: model_name"))?;

    match state.orchestrator.set_model(&model).await {
        Ok(true) => Ok(Json(SetModelResponse {
            success: true,
            message: format!("model set to {}", model),
        })),
        Ok(false) => Ok(Json(SetModelResponse {
            success: false,
            message: format!("model {} is not available", model),
        })),
        Err(e) => {
            warn!(kind = failure_kind(&e), error = %e, "model switch failed");
            Err(api_error(Status::BadGateway, e.to_string()))
        }
    }
}

#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Custom<Json<ApiResponse<()>>> {
    api_error(status, format!("{} {}: {}", req.method(), req.uri(), status.reason_lossy()))
}

/// Rocket figment with `[server]` address/port applied over Rocket's own sources.
pub fn figment_from_config(config: &Config) -> Figment {
    let mut fig = rocket::Config::figment();
    if let Some(server) = &config.server {
        if let Some(address) = &server.address {
            fig = fig.merge(("address", address.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }
    fig
}

pub fn build_rocket(state: AppState, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount(
            "/",
            routes![
                health,
                status,
                cities,
                locales,
                weather,
                news,
                news_content,
                summary,
                discuss_news,
                clear_conversation,
                models,
                set_model,
                current_model,
            ],
        )
        .register("/", catchers![default_catcher])
}

/// Run the HTTP server until Rocket shuts down (SIGINT/SIGTERM etc.)
pub async fn launch_rocket(state: AppState, figment: Figment) -> Result<()> {
    info!("Starting Rocket HTTP server");
    build_rocket(state, figment)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;
    info!("Rocket HTTP server has shut down");
    Ok(())
}
