//! Query functions for bearer sessions.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use super::models::{Session, User};
use super::{StoreError, StoreResult};
use crate::clock::generate_token;

/// Create a new session for a user with the given lifetime in seconds.
pub async fn create_session(
    pool: &SqlitePool,
    user_id: i64,
    ttl_seconds: u64,
    now: DateTime<Utc>,
) -> StoreResult<Session> {
    let token = generate_token();
    let expires_at = now + Duration::seconds(ttl_seconds as i64);

    let session = sqlx::query_as::<_, Session>(
        "INSERT INTO sessions (id, user_id, created_at, expires_at) \
         VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(&token)
    .bind(user_id)
    .bind(now)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

/// Resolve a token to its session and user.
///
/// An unknown token is `NotFound`; a known-but-expired token is `Expired`.
/// Expired rows are left in place for the maintenance sweep.
pub async fn lookup_session(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> StoreResult<(Session, User)> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)?;

    if session.expires_at <= now {
        return Err(StoreError::Expired);
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(session.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)?;

    Ok((session, user))
}

/// Rotate a session: issue a fresh token with a full lifetime while the old
/// token stays valid until `now + grace` (never later than it already was).
///
/// The clamp and the insert commit together, so a refresh race cannot leave
/// the old token with more than the grace window.
pub async fn extend_or_rotate_session(
    pool: &SqlitePool,
    old_token: &str,
    ttl_seconds: u64,
    grace_seconds: u64,
    now: DateTime<Utc>,
) -> StoreResult<Session> {
    let mut tx = pool.begin().await?;

    let old = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(old_token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

    if old.expires_at <= now {
        return Err(StoreError::Expired);
    }

    let grace_until = (now + Duration::seconds(grace_seconds as i64)).min(old.expires_at);
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(grace_until)
        .bind(old_token)
        .execute(&mut *tx)
        .await?;

    let token = generate_token();
    let expires_at = now + Duration::seconds(ttl_seconds as i64);
    let session = sqlx::query_as::<_, Session>(
        "INSERT INTO sessions (id, user_id, created_at, expires_at) \
         VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(&token)
    .bind(old.user_id)
    .bind(now)
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(session)
}

/// Delete a session by token. Idempotent: deleting an absent token is not an
/// error.
pub async fn delete_session(pool: &SqlitePool, token: &str) -> StoreResult<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete all expired sessions. Returns the number of rows removed.
pub async fn delete_expired(pool: &SqlitePool, now: DateTime<Utc>) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
