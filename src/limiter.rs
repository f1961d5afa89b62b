//! Backend-authoritative rate limiting.
//!
//! The limiter is policy glue: it resolves the configured `(max, window)`
//! pair for an action and delegates the linearizable check-and-bump to the
//! store. Denials bump the process metrics so operators can see pressure
//! without reading request logs.

use tracing::debug;

use crate::config::RateAction;
use crate::state::AppState;
use crate::store::StoreResult;
pub use crate::store::rate::RateDecision;

/// Check and count one request by `subject` against the action's policy.
///
/// Subjects are opaque here: a bearer token for authenticated routes, an
/// anonymous session id otherwise. The decision is authoritative; callers
/// must not invoke downstream collaborators on a denial.
pub async fn check(state: &AppState, subject: &str, action: RateAction) -> StoreResult<RateDecision> {
    let policy = state.config.rate_policy(action);
    let now = state.clock.now();

    let decision = crate::store::rate::check_and_bump(
        &state.db_pool,
        subject,
        action.as_str(),
        policy.max_requests,
        policy.window_seconds,
        now.timestamp(),
    )
    .await?;

    if let RateDecision::Denied { retry_after } = decision {
        state.metrics.record_rate_limited();
        debug!(
            action = action.as_str(),
            retry_after = retry_after,
            max_requests = policy.max_requests,
            window_seconds = policy.window_seconds,
            "rate_limit_denied"
        );
    }

    Ok(decision)
}
