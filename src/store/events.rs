//! Append-only analytics event stream.

use sqlx::SqlitePool;

use super::StoreResult;
use super::models::NewEvent;

/// Append one event. Events are never updated or deleted by the service.
pub async fn append_event(pool: &SqlitePool, event: &NewEvent) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO analytics_events (id, user_id, session_token, event_type, payload, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.id)
    .bind(event.user_id)
    .bind(&event.session_token)
    .bind(&event.event_type)
    .bind(event.payload.as_ref().map(|p| p.to_string()))
    .bind(event.created_at)
    .execute(pool)
    .await?;

    Ok(())
}
