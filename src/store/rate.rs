//! Fixed-window rate counters with linearizable check-and-bump.

use sqlx::SqlitePool;

use super::StoreResult;

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { retry_after: u64 },
}

/// Atomically check and bump the counter for `(subject, action)`.
///
/// The guarded `UPDATE` is the linearization point: it increments (or
/// resets, when the window has elapsed) only when the request is admissible,
/// so two concurrent calls can never both take the last slot. A denial does
/// not increment and therefore cannot extend the window.
pub async fn check_and_bump(
    pool: &SqlitePool,
    subject: &str,
    action: &str,
    max_requests: u32,
    window_seconds: u64,
    now_unix: i64,
) -> StoreResult<RateDecision> {
    let window = window_seconds as i64;

    // Ensure a row exists; a fresh row counts from zero so the guarded
    // update below treats it exactly like an in-window counter.
    sqlx::query(
        "INSERT OR IGNORE INTO rate_counters (subject, action, count, window_start) \
         VALUES (?, ?, 0, ?)",
    )
    .bind(subject)
    .bind(action)
    .bind(now_unix)
    .execute(pool)
    .await?;

    let updated = sqlx::query(
        "UPDATE rate_counters SET \
             count = CASE WHEN ? - window_start >= ? THEN 1 ELSE count + 1 END, \
             window_start = CASE WHEN ? - window_start >= ? THEN ? ELSE window_start END \
         WHERE subject = ? AND action = ? \
           AND (? - window_start >= ? OR count < ?)",
    )
    .bind(now_unix)
    .bind(window)
    .bind(now_unix)
    .bind(window)
    .bind(now_unix)
    .bind(subject)
    .bind(action)
    .bind(now_unix)
    .bind(window)
    .bind(max_requests)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 1 {
        return Ok(RateDecision::Allowed);
    }

    let window_start: Option<(i64,)> = sqlx::query_as(
        "SELECT window_start FROM rate_counters WHERE subject = ? AND action = ?",
    )
    .bind(subject)
    .bind(action)
    .fetch_optional(pool)
    .await?;

    // Row swept between statements: the next attempt will be admitted.
    let Some((window_start,)) = window_start else {
        return Ok(RateDecision::Denied { retry_after: 1 });
    };

    let elapsed = now_unix - window_start;
    let retry_after = (window - elapsed).clamp(1, window) as u64;

    Ok(RateDecision::Denied { retry_after })
}

/// Delete counters whose window closed before `older_than_unix`.
pub async fn delete_stale(pool: &SqlitePool, older_than_unix: i64) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM rate_counters WHERE window_start < ?")
        .bind(older_than_unix)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
