//! API handlers for the site
//!
//! Provides REST endpoints for:
//! - File uploads into blob storage
//! - Feedback and intake submissions
//! - Survey answers
//! - The chat assistant
//! - Exchange rates for the currency converter
//! - Service catalog and locale pages

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use intake_core::{FieldDescriptor, SubmissionDocument, EMPTY_SUBMISSION_MESSAGE, MAX_FILE_SIZE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backends::{BlobObject, ChatMessage, RateTable, Role, SearchDepth, SearchHit};
use crate::error::ApiError;
use crate::locale::Locale;
use crate::state::AppState;

/// Model used when the client does not pick one
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-chat";

/// Characters of an attached document forwarded to the model
pub const MAX_FILE_CONTEXT_CHARS: usize = 20_000;

const ASSISTANT_PROMPT: &str = "你是一名专业的商务咨询顾问，为客户解答公司注册、税务筹划、移民及健康评估相关问题。回答应准确、简洁，不确定时请说明。";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "site-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Plain confirmation body
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// ============================================================
// Upload
// ============================================================

#[derive(Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

/// Reject names that would escape the uploads prefix
fn sanitize_filename(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidRequest("Filename is required".into()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ApiError::InvalidRequest(format!("Invalid filename: {}", name)));
    }
    Ok(name)
}

/// Handler: POST /api/upload?filename=<name>&overwrite=<bool>
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<BlobObject>, ApiError> {
    let filename = sanitize_filename(query.filename.as_deref().unwrap_or_default())?;
    let too_large =
        || ApiError::InvalidRequest(format!("File '{}' exceeds the 10MB limit", filename));

    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(too_large())
        }
        Err(rejection) => return Err(ApiError::InvalidRequest(rejection.body_text())),
    };
    if body.is_empty() {
        return Err(ApiError::InvalidRequest("File body is empty".into()));
    }
    if body.len() as u64 > MAX_FILE_SIZE {
        return Err(too_large());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    info!(filename, size = body.len(), overwrite = query.overwrite, "Upload request");

    let object = state
        .blobs
        .put(
            &format!("uploads/{}", filename),
            body,
            content_type,
            query.overwrite,
        )
        .await?;

    Ok(Json(object))
}

/// Handler: GET /blobs/*pathname
///
/// Serves objects kept by the in-memory blob store.
pub async fn handle_blob(
    State(state): State<AppState>,
    Path(pathname): Path<String>,
) -> Result<Response, ApiError> {
    let pathname = pathname.trim_start_matches('/');
    match state.blobs.get(pathname).await? {
        Some((content_type, body)) => {
            Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
        }
        None => Err(ApiError::NotFound(format!("blob '{}'", pathname))),
    }
}

// ============================================================
// Submissions
// ============================================================

/// Body of POST /api/submit.
///
/// Two pages post here: the feedback form (`content`, `fileUrls`,
/// `userId`) and the document-intake form (`formData`, `services`, `id`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub content: Option<String>,
    pub file_urls: Option<Vec<String>>,
    pub user_id: Option<String>,
    pub form_data: Option<SubmissionDocument>,
    pub services: Option<Vec<String>>,
    pub id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::InvalidRequest(format!("Missing required field: {}", name))),
    }
}

/// Handler: POST /api/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let now = Utc::now();

    if let Some(form_data) = req.form_data {
        let id = required(req.id, "id")?;
        let services = req.services.unwrap_or_default();
        if services.is_empty() {
            return Err(ApiError::InvalidRequest("Missing required field: services".into()));
        }
        if form_data.is_empty() {
            return Err(ApiError::InvalidRequest(EMPTY_SUBMISSION_MESSAGE.into()));
        }
        if let Some(unknown) = services.iter().find(|s| state.registry.service(s).is_none()) {
            return Err(ApiError::InvalidRequest(format!("Unknown service: {}", unknown)));
        }

        let record = json!({
            "id": id,
            "services": services,
            "formData": form_data,
            "submittedAt": now.to_rfc3339(),
        });
        state.kv.set(&format!("submission:{}", id), &record).await?;

        info!(id = %id, services = ?services, fields = form_data.len(), "Intake submission stored");
        return Ok(MessageResponse::new("提交成功"));
    }

    let user_id = required(req.user_id, "userId")?;
    let content = req.content.unwrap_or_default();
    let file_urls = req.file_urls.unwrap_or_default();
    if content.trim().is_empty() && file_urls.is_empty() {
        return Err(ApiError::InvalidRequest(EMPTY_SUBMISSION_MESSAGE.into()));
    }

    let key = format!("feedback:{}:{}", user_id, now.timestamp_millis());
    let record = json!({
        "userId": user_id,
        "content": content,
        "fileUrls": file_urls,
        "submittedAt": now.to_rfc3339(),
    });
    state.kv.set(&key, &record).await?;

    info!(key = %key, files = file_urls.len(), "Feedback stored");
    Ok(MessageResponse::new("提交成功"))
}

/// Body of POST /api/submit-survey
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRequest {
    pub id: Option<String>,
    pub submitted_at: Option<String>,
    pub answers: Option<Value>,
}

/// Handler: POST /api/submit-survey
pub async fn handle_submit_survey(
    State(state): State<AppState>,
    Json(req): Json<SurveyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = required(req.id, "id")?;
    let submitted_at = required(req.submitted_at, "submittedAt")?;
    let answers = match req.answers {
        Some(answers) if !answers.is_null() => answers,
        _ => return Err(ApiError::InvalidRequest("Missing required field: answers".into())),
    };

    let record = json!({
        "id": id,
        "submittedAt": submitted_at,
        "answers": answers,
    });
    state.kv.set(&format!("survey:{}", id), &record).await?;

    info!(id = %id, "Survey stored");
    Ok(MessageResponse::new("Survey submitted successfully"))
}

// ============================================================
// Chat assistant
// ============================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    pub model: Option<String>,
    #[serde(default)]
    pub enable_web_search: bool,
    #[serde(default)]
    pub enable_deep_search: bool,
    #[serde(default)]
    pub enable_markdown_output: bool,
    pub file_content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: ChatOptions,
}

/// Assistant reply plus the web sources it was given
#[derive(Debug, Serialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchHit>,
}

fn search_context(hits: &[SearchHit]) -> String {
    let mut context = String::from("以下是与用户问题相关的网络搜索结果，请参考并在回答中注明来源：\n");
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("[{}] {} ({})\n{}\n", i + 1, hit.title, hit.url, hit.content));
    }
    context
}

/// Build the prompt sent upstream: system instructions, optional document
/// and search context, then the conversation.
pub fn compose_prompt(
    options: &ChatOptions,
    hits: &[SearchHit],
    conversation: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(ASSISTANT_PROMPT)];

    messages.push(ChatMessage::system(if options.enable_markdown_output {
        "请使用 Markdown 格式组织回答。"
    } else {
        "请使用纯文本回答，不要使用 Markdown 格式。"
    }));

    if let Some(content) = options.file_content.as_deref().filter(|c| !c.trim().is_empty()) {
        let excerpt: String = content.chars().take(MAX_FILE_CONTEXT_CHARS).collect();
        messages.push(ChatMessage::system(format!("用户上传的文件内容如下：\n{}", excerpt)));
    }

    if !hits.is_empty() {
        messages.push(ChatMessage::system(search_context(hits)));
    }

    messages.extend(conversation.iter().filter(|m| m.role != Role::System).cloned());
    messages
}

/// Handler: POST /api/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let question = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User && !m.content.trim().is_empty())
        .map(|m| m.content.clone())
        .ok_or_else(|| ApiError::InvalidRequest("At least one user message is required".into()))?;

    let model = req
        .options
        .model
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());

    let mut sources = Vec::new();
    if req.options.enable_web_search || req.options.enable_deep_search {
        let depth = if req.options.enable_deep_search {
            SearchDepth::Advanced
        } else {
            SearchDepth::Basic
        };
        match state.search.search(&question, depth).await {
            Ok(hits) => sources = hits,
            // Answer without sources rather than failing the whole chat
            Err(e) => warn!("Web search failed: {}", e),
        }
    }

    let prompt = compose_prompt(&req.options, &sources, &req.messages);
    debug!(model = %model, messages = prompt.len(), sources = sources.len(), "Chat completion");

    let message = state.chat.complete(&model, &prompt).await?;
    Ok(Json(ChatReply { message, sources }))
}

// ============================================================
// Exchange rates
// ============================================================

#[derive(Deserialize)]
pub struct RatesQuery {
    pub base: Option<String>,
}

/// Handler: GET /api/exchange-rate?base=USD
pub async fn handle_exchange_rate(
    State(state): State<AppState>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<RateTable>, ApiError> {
    let base = query
        .base
        .unwrap_or_else(|| "USD".to_string())
        .trim()
        .to_uppercase();
    if base.len() != 3 || !base.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::InvalidRequest(format!("Invalid currency code: {}", base)));
    }

    let table = state.rates.latest(&base).await?;
    Ok(Json(table))
}

// ============================================================
// Service catalog
// ============================================================

#[derive(Serialize)]
pub struct ServiceSummary {
    pub id: String,
    pub title: String,
    pub field_count: usize,
}

/// Handler: GET /api/services
pub async fn handle_list_services(State(state): State<AppState>) -> Json<Vec<ServiceSummary>> {
    Json(
        state
            .registry
            .services()
            .iter()
            .map(|s| ServiceSummary {
                id: s.id.clone(),
                title: s.title.clone(),
                field_count: s.fields.len(),
            })
            .collect(),
    )
}

/// Handler: GET /api/services/fields?ids=a,b
pub async fn handle_service_fields(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<FieldDescriptor>>, ApiError> {
    let ids: Vec<&str> = query
        .get("ids")
        .map(|ids| ids.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    if ids.is_empty() {
        return Err(ApiError::InvalidRequest("Missing required parameter: ids".into()));
    }

    let fields = state
        .registry
        .fields_for(ids.as_slice())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(fields))
}

// ============================================================
// Locale pages
// ============================================================

fn parse_locale(code: &str) -> Result<Locale, ApiError> {
    code.parse()
        .map_err(|code| ApiError::NotFound(format!("locale '{}'", code)))
}

/// Handler: GET /
pub async fn handle_root() -> Redirect {
    Redirect::temporary(&format!("/{}", Locale::DEFAULT))
}

/// Handler: GET /:locale
pub async fn handle_locale_home(Path(code): Path<String>) -> Result<Json<Value>, ApiError> {
    let locale = parse_locale(&code)?;
    Ok(Json(json!({
        "locale": locale,
        "defaultLocale": Locale::DEFAULT,
        "locales": Locale::ALL,
    })))
}

/// Handler: GET /:locale/services
pub async fn handle_locale_services(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let locale = parse_locale(&code)?;
    let Json(services) = handle_list_services(State(state)).await;
    Ok(Json(json!({
        "locale": locale,
        "services": services,
    })))
}
