//! Identity lifecycle handlers: signup, verification, session management.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use chrono::Duration;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::clock::{generate_token, generate_uuid};
use crate::state::AppState;
use crate::store::models::User;
use crate::store::{StoreError, sessions, users, verification};
use crate::web::error::ApiError;
use crate::web::extractors::{AppJson, bearer_token};

/// `POST /api/v1/anon-session` — Mint identifiers for an anonymous visitor.
///
/// Nothing is persisted and no trust attaches to the ids; they exist to
/// group events and key anonymous rate counters.
pub async fn anon_session() -> Json<Value> {
    Json(json!({
        "session_id": generate_uuid(),
        "anon_id": generate_uuid(),
    }))
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub consent_data_storage: bool,
    /// Accepted for widget compatibility; carries no server-side behavior.
    #[serde(default)]
    #[allow(dead_code)]
    pub migrate_session: Option<bool>,
}

/// `POST /api/v1/auth/signup` — Start email verification.
///
/// The response is identical for new and already-registered addresses, so
/// signup cannot be used to probe the user table.
pub async fn signup(
    State(state): State<AppState>,
    AppJson(body): AppJson<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    if !body.consent_data_storage {
        return Err(ApiError::consent_required());
    }

    let email = users::normalize_email(&body.email)
        .map_err(|_| ApiError::invalid_request("invalid email address"))?;

    let now = state.clock.now();
    let user = match users::create_user(&state.db_pool, &email, true, now).await {
        Ok(user) => user,
        Err(StoreError::AlreadyExists) => users::get_user_by_email(&state.db_pool, &email).await?,
        Err(e) => return Err(e.into()),
    };

    // Test mode issues the deterministic fixture token so integration suites
    // can complete the verify step without reading mail.
    let token = if state.config.integration_test_mode {
        verification::INTEGRATION_TEST_TOKEN.to_owned()
    } else {
        generate_token()
    };
    let expires_at = now + Duration::seconds(state.config.verification_ttl_seconds as i64);
    verification::put_verification_token(&state.db_pool, &email, &token, expires_at).await?;

    let body_html = format!(
        "<p>Confirm your address to finish signing in: \
         <a href=\"https://widget.docent.app/verify?token={token}\">verify</a></p>"
    );
    state
        .mailer
        .send(&email, "Verify your Docent account", &body_html)
        .await
        .map_err(|e| {
            warn!(error = %e, "mail_send_failed");
            ApiError::service_unavailable()
        })?;

    info!(user_id = user.id, "verification_sent");
    Ok(Json(json!({ "status": "verification_sent" })))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

fn user_profile(user: &User) -> Value {
    json!({ "email": user.email, "tier": user.tier })
}

/// `POST /api/v1/auth/verify` — Consume a verification token and log in.
///
/// Consumption is atomic; under concurrent attempts on the same token
/// exactly one caller receives a session.
pub async fn verify(
    State(state): State<AppState>,
    AppJson(body): AppJson<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.token.is_empty() || body.token.len() > 256 {
        return Err(ApiError::verification_failed());
    }

    let now = state.clock.now();
    let email =
        match verification::consume_verification_token(&state.db_pool, &body.token, now).await {
            Ok(email) => email,
            Err(StoreError::NotFound) | Err(StoreError::Expired) => {
                return Err(ApiError::token_expired());
            }
            Err(e) => return Err(e.into()),
        };

    let user = users::get_user_by_email(&state.db_pool, &email).await?;
    let user = users::mark_verified(&state.db_pool, user.id).await?;

    let session = sessions::create_session(
        &state.db_pool,
        user.id,
        state.config.session_ttl_seconds,
        now,
    )
    .await?;

    info!(user_id = user.id, "user_verified");
    Ok(Json(json!({
        "session_token": session.id,
        "user_profile": user_profile(&user),
    })))
}

/// `GET /api/v1/auth/session-check` — Probe whether a bearer authenticates.
///
/// Always 200: a probe must be safe to call with an expired token.
pub async fn session_check(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let Some(token) = bearer_token(&headers) else {
        return Ok(Json(json!({ "valid": false })));
    };

    let now = state.clock.now();
    match sessions::lookup_session(&state.db_pool, &token, now).await {
        Ok((_, user)) => Ok(Json(json!({ "valid": true, "user": user_profile(&user) }))),
        Err(StoreError::NotFound) | Err(StoreError::Expired) => {
            Ok(Json(json!({ "valid": false })))
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /api/v1/auth/refresh-token` — Rotate the presented session.
///
/// The old token keeps authenticating for the configured grace window so
/// concurrent in-flight requests do not race the rotation.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token =
        bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    let now = state.clock.now();
    let session = match sessions::extend_or_rotate_session(
        &state.db_pool,
        &token,
        state.config.session_ttl_seconds,
        state.config.refresh_grace_seconds(),
        now,
    )
    .await
    {
        Ok(session) => session,
        Err(StoreError::NotFound) | Err(StoreError::Expired) => {
            return Err(ApiError::session_expired());
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = session.user_id, "session_refreshed");
    Ok(Json(json!({ "token": session.id })))
}

/// `POST /api/v1/auth/logout` — Destroy the presented session. Idempotent;
/// an unknown token still gets 204. Only the presented token is revoked, a
/// grace-window partner from an earlier refresh expires on its own.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = bearer_token(&headers) {
        sessions::delete_session(&state.db_pool, &token).await?;
        info!("session_logged_out");
    }
    Ok(StatusCode::NO_CONTENT)
}
