//! Append-only analytics ingest.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::clock::generate_uuid;
use crate::state::AppState;
use crate::store::events;
use crate::store::models::NewEvent;
use crate::web::error::ApiError;
use crate::web::extractors::{AppJson, MaybeAuthUser};

/// Accepted event types. Anything else is rejected before it reaches the
/// store.
const EVENT_TYPES: &[&str] = &[
    "widget_open",
    "widget_close",
    "session_started",
    "message_sent",
    "answer_rated",
    "link_clicked",
    "error",
];

#[derive(Deserialize)]
pub struct EventRequest {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Option<Value>,
}

/// `POST /api/v1/analytics/event` — Record one widget event.
///
/// Anonymous events are welcome; when a bearer authenticates, the event is
/// attributed. The route carries a 4 KiB body cap instead of a rate limit.
pub async fn ingest_event(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    AppJson(body): AppJson<EventRequest>,
) -> Result<Json<Value>, ApiError> {
    if !EVENT_TYPES.contains(&body.event_type.as_str()) {
        return Err(ApiError::invalid_request(format!(
            "unknown event_type '{}'",
            body.event_type
        )));
    }

    let now = state.clock.now();
    let event = NewEvent {
        id: generate_uuid(),
        user_id: auth.0.as_ref().map(|a| a.user.id),
        session_token: auth.0.as_ref().map(|a| a.token.clone()),
        event_type: body.event_type,
        payload: body.event_data,
        created_at: now,
    };

    events::append_event(&state.db_pool, &event).await?;

    Ok(Json(json!({
        "event_id": event.id,
        "logged_at": now,
    })))
}
