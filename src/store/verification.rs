//! Query functions for single-use email verification tokens.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{StoreError, StoreResult};

/// Deterministic fixture account for integration-test mode.
pub const INTEGRATION_TEST_EMAIL: &str = "test@integration.local";

/// Deterministic fixture token issued in integration-test mode so suites can
/// complete the verify step without reading mail.
pub const INTEGRATION_TEST_TOKEN: &str = "integration-test-verification-token-67890";

/// Store a verification token for an email, replacing any earlier token.
///
/// The replace is idempotent: after this call exactly one token is
/// consumable for the email, and a token string can belong to at most one
/// email (relevant for the deterministic test-mode token).
pub async fn put_verification_token(
    pool: &SqlitePool,
    email: &str,
    token: &str,
    expires_at: DateTime<Utc>,
) -> StoreResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM verification_tokens WHERE email = ? OR token = ?")
        .bind(email)
        .bind(token)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO verification_tokens (token, email, expires_at) VALUES (?, ?, ?)")
        .bind(token)
        .bind(email)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Atomically burn a token, returning the email it was bound to.
///
/// The single `DELETE ... RETURNING` is the linearization point: under
/// concurrent consume attempts exactly one caller gets the row. A burned or
/// never-issued token is `NotFound`; a token past its expiry is `Expired`
/// (and is gone either way, tokens are single-use).
pub async fn consume_verification_token(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> StoreResult<String> {
    let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
        "DELETE FROM verification_tokens WHERE token = ? RETURNING email, expires_at",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let (email, expires_at) = row.ok_or(StoreError::NotFound)?;
    if expires_at <= now {
        return Err(StoreError::Expired);
    }
    Ok(email)
}

/// Delete all expired tokens. Returns the number of rows removed.
pub async fn delete_expired(pool: &SqlitePool, now: DateTime<Utc>) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
