//! Session-gated entry points to the downstream collaborators.
//!
//! Every handler follows the same shape: validate, authenticate, consult the
//! rate limiter, and only then spend money downstream. A denial never
//! reaches the collaborator.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::config::RateAction;
use crate::context::current_request_id;
use crate::limiter::{self, RateDecision};
use crate::personalize::Personalization;
use crate::rag::{Answer, ChatMode, GenerateRequest, GeneratorError, RequestTier};
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::extractors::{AppJson, AuthUser, MaybeAuthUser};

const MAX_MESSAGE_LEN: usize = 2000;
const MAX_SELECTED_TEXT_LEN: usize = 5000;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context: ChatContext,
    pub tier: RequestTier,
}

#[derive(Deserialize)]
pub struct ChatContext {
    pub mode: ChatMode,
    #[serde(default)]
    pub selected_text: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub page_url: Option<String>,
    pub session_id: String,
}

fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    let parsed = Uuid::parse_str(session_id).map_err(|_| ApiError::invalid_session_id())?;
    if parsed.get_version_num() != 4 {
        return Err(ApiError::invalid_session_id());
    }
    Ok(())
}

/// `POST /api/v1/chat` — Ask a question against the corpus.
///
/// Anonymous callers are admitted; their rate subject is the widget session
/// id. Authenticated callers are keyed (and tiered) by their bearer.
pub async fn chat(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    AppJson(body): AppJson<ChatRequest>,
) -> Result<Json<Answer>, ApiError> {
    if body.message.is_empty() {
        return Err(ApiError::invalid_request("message must not be empty"));
    }
    if body.message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::message_too_long(MAX_MESSAGE_LEN));
    }
    if let Some(selected) = &body.context.selected_text
        && selected.chars().count() > MAX_SELECTED_TEXT_LEN
    {
        return Err(ApiError::invalid_request(format!(
            "selected_text must be at most {MAX_SELECTED_TEXT_LEN} characters"
        )));
    }
    validate_session_id(&body.context.session_id)?;

    let (subject, tier) = match &auth.0 {
        Some(auth) => (auth.token.clone(), RequestTier::from(auth.user.tier)),
        None => (body.context.session_id.clone(), body.tier),
    };

    if let RateDecision::Denied { retry_after } =
        limiter::check(&state, &subject, RateAction::Chat).await?
    {
        return Err(ApiError::rate_limited(retry_after));
    }

    let request = GenerateRequest {
        query: body.message,
        mode: body.context.mode,
        selected_text: body.context.selected_text,
        tier,
        request_id: current_request_id().unwrap_or_default(),
    };

    let answer = tokio::time::timeout(state.config.request_timeout, state.generator.generate(request))
        .await
        .map_err(|_| ApiError::request_timeout())?
        .map_err(|e| match e {
            GeneratorError::Timeout => ApiError::request_timeout(),
            GeneratorError::Unavailable(detail) => {
                tracing::warn!(detail = %detail, "generator_unavailable");
                ApiError::service_unavailable()
            }
        })?;

    Ok(Json(answer))
}

#[derive(Deserialize)]
pub struct SaveRequest {
    pub messages: Vec<SavedMessage>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize, serde::Serialize)]
pub struct SavedMessage {
    pub role: String,
    pub content: String,
}

/// `POST /api/v1/chat/save` — Persist a conversation for the caller.
pub async fn save_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(body): AppJson<SaveRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.messages.is_empty() {
        return Err(ApiError::invalid_request("messages must not be empty"));
    }
    if body
        .messages
        .iter()
        .any(|m| m.role.is_empty() || m.content.is_empty())
    {
        return Err(ApiError::invalid_request(
            "every message needs a role and content",
        ));
    }

    if let RateDecision::Denied { retry_after } =
        limiter::check(&state, &auth.token, RateAction::Save).await?
    {
        return Err(ApiError::rate_limited(retry_after));
    }

    let now = state.clock.now();
    let messages = serde_json::to_value(&body.messages)
        .map_err(|_| ApiError::invalid_request("messages are not serializable"))?;
    let chat_id = crate::store::chats::save_chat(
        &state.db_pool,
        auth.user.id,
        body.title.as_deref(),
        &messages,
        now,
    )
    .await?;

    info!(user_id = auth.user.id, chat_id = chat_id, "chat_saved");
    Ok(Json(json!({
        "chat_id": chat_id.to_string(),
        "saved_at": now,
    })))
}

#[derive(Deserialize)]
pub struct PersonalizeRequest {
    pub preferences: Value,
}

/// `POST /api/v1/user/personalize` — Tier-aware recommendations.
pub async fn personalize(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(body): AppJson<PersonalizeRequest>,
) -> Result<Json<Personalization>, ApiError> {
    if !body.preferences.is_object() {
        return Err(ApiError::invalid_request("preferences must be an object"));
    }

    if let RateDecision::Denied { retry_after } =
        limiter::check(&state, &auth.token, RateAction::Personalize).await?
    {
        return Err(ApiError::rate_limited(retry_after));
    }

    let result = state.personalizer.recommend(&auth.user, &body.preferences);
    Ok(Json(result))
}
