//! Query functions for saved conversations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::StoreResult;

/// Persist a serialized message list for a user, returning the new chat id.
pub async fn save_chat(
    pool: &SqlitePool,
    user_id: i64,
    title: Option<&str>,
    messages: &serde_json::Value,
    now: DateTime<Utc>,
) -> StoreResult<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO saved_chats (user_id, title, messages, created_at) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(user_id)
    .bind(title)
    .bind(messages.to_string())
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Number of chats saved by a user.
pub async fn count_chats(pool: &SqlitePool, user_id: i64) -> StoreResult<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM saved_chats WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
