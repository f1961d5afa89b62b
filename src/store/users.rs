//! Query functions for user accounts.

use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::SqlitePool;
use std::sync::LazyLock;

use super::models::User;
use super::{StoreError, StoreResult};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

/// Normalize and validate an email address. Addresses are case-insensitive;
/// the lowercased form is the canonical key.
pub fn normalize_email(email: &str) -> StoreResult<String> {
    let email = email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(StoreError::InvalidEmail);
    }
    Ok(email)
}

/// Create a new user. Requires consent; rejects malformed addresses.
///
/// A duplicate email surfaces as [`StoreError::AlreadyExists`] so the caller
/// can decide whether reuse is acceptable (signup reuses, nothing else does).
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    consent: bool,
    now: DateTime<Utc>,
) -> StoreResult<User> {
    if !consent {
        return Err(StoreError::ConsentRequired);
    }
    let email = normalize_email(email)?;

    let result = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, created_at) VALUES (?, ?) RETURNING *",
    )
    .bind(&email)
    .bind(now)
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(StoreError::AlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch a user by canonical (lowercased) email.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> StoreResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)
}

/// Fetch a user by id.
pub async fn get_user(pool: &SqlitePool, user_id: i64) -> StoreResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)
}

/// Set the verified flag, returning the updated user.
pub async fn mark_verified(pool: &SqlitePool, user_id: i64) -> StoreResult<User> {
    sqlx::query_as::<_, User>("UPDATE users SET verified = 1 WHERE id = ? RETURNING *")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(
            normalize_email("Alice@Example.COM").unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for bad in ["", "no-at-sign", "a@b", "a b@c.com", "@example.com"] {
            assert!(matches!(
                normalize_email(bad),
                Err(StoreError::InvalidEmail)
            ));
        }
    }
}
