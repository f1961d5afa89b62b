//! Liveness and operational-metrics endpoints.

use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use tracing::{trace, warn};

use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

/// `GET /health` — Liveness plus a storage reachability probe.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    trace!("health check requested");

    let database_ok = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db_pool)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "health_check_db_failed");
            false
        }
    };

    Json(json!({
        "status": if database_ok { "ok" } else { "degraded" },
        "database": if database_ok { "connected" } else { "disconnected" },
        "uptime_seconds": state.metrics.snapshot().uptime_seconds,
    }))
}

/// `GET /metrics` — Read-only snapshot of the process-local counters.
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
