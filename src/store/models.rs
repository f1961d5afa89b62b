//! Row types for the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access tier for a registered account. Anonymous callers have no row and
/// are represented only at the request layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Lightweight,
    Full,
    Premium,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub verified: bool,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
}

/// A bearer session. `id` is the opaque token itself.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Append-only analytics record.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub id: String,
    pub user_id: Option<i64>,
    pub session_token: Option<String>,
    pub event_type: String,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
