//! Durable state: the only component that reads or writes persistent storage.
//!
//! Handlers never touch the pool directly; they go through the query
//! functions in the submodules, each of which returns typed domain variants
//! for logical failures and [`StoreError::Unavailable`] for transient storage
//! problems.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

pub mod chats;
pub mod events;
pub mod models;
pub mod rate;
pub mod sessions;
pub mod users;
pub mod verification;

/// The initial migration SQL, embedded at compile time.
const INIT_MIGRATION: &str = include_str!("migrations/001_init.sql");

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed store failures. Logical violations are domain variants; anything
/// coming out of the driver is a transient `Unavailable`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record expired")]
    Expired,
    #[error("record already exists")]
    AlreadyExists,
    #[error("consent is required")]
    ConsentRequired,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Initialize the SQLite pool and apply migrations.
pub async fn init(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Apply migrations using a simple version-tracking approach.
async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (\
         version INTEGER PRIMARY KEY, \
         applied_at TEXT NOT NULL DEFAULT (datetime('now')))",
    )
    .execute(pool)
    .await?;

    let applied: bool = sqlx::query("SELECT 1 FROM _migrations WHERE version = 1")
        .fetch_optional(pool)
        .await?
        .is_some();

    if !applied {
        // Split on semicolons and execute each statement.
        for statement in INIT_MIGRATION.split(';') {
            let stmt = statement
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            sqlx::query(stmt).execute(pool).await?;
        }

        sqlx::query("INSERT INTO _migrations (version) VALUES (1)")
            .execute(pool)
            .await?;

        info!(version = 1, "migration_applied");
    }

    Ok(())
}

/// Deterministic fixtures for integration-test mode.
///
/// Seeds the well-known verification account so end-to-end suites can drive
/// the signup/verify flow without an out-of-band mail hop.
pub async fn seed_integration_fixtures(pool: &SqlitePool, now: DateTime<Utc>) -> StoreResult<()> {
    match users::create_user(pool, verification::INTEGRATION_TEST_EMAIL, true, now).await {
        Ok(_) | Err(StoreError::AlreadyExists) => {}
        Err(e) => return Err(e),
    }

    verification::put_verification_token(
        pool,
        verification::INTEGRATION_TEST_EMAIL,
        verification::INTEGRATION_TEST_TOKEN,
        now + chrono::Duration::hours(24),
    )
    .await?;

    info!(email = verification::INTEGRATION_TEST_EMAIL, "integration_fixtures_seeded");
    Ok(())
}

/// Counts from one maintenance sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct PruneReport {
    pub sessions: u64,
    pub verification_tokens: u64,
    pub rate_counters: u64,
}

/// Best-effort maintenance: drop expired sessions and tokens, and rate
/// counters whose window closed more than a day ago.
pub async fn prune_expired(pool: &SqlitePool, now: DateTime<Utc>) -> StoreResult<PruneReport> {
    let sessions = sessions::delete_expired(pool, now).await?;
    let verification_tokens = verification::delete_expired(pool, now).await?;
    let rate_counters = rate::delete_stale(pool, now.timestamp() - 86400).await?;

    Ok(PruneReport {
        sessions,
        verification_tokens,
        rate_counters,
    })
}
