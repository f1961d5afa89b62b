//! Periodic store maintenance.

use super::Service;
use crate::state::AppState;
use crate::store;
use std::time::Duration;
use tracing::{info, warn};

/// Sweeps expired sessions, verification tokens, and stale rate counters.
/// Pruning is best-effort; reads never depend on it (expiry is always
/// checked at lookup time).
pub struct MaintenanceService {
    app_state: AppState,
    interval: Duration,
}

impl MaintenanceService {
    pub fn new(app_state: AppState) -> Self {
        // Test mode sweeps aggressively so suites can observe cleanup.
        let interval = if app_state.config.integration_test_mode {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(600)
        };
        Self {
            app_state,
            interval,
        }
    }
}

#[async_trait::async_trait]
impl Service for MaintenanceService {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let now = self.app_state.clock.now();
            match store::prune_expired(&self.app_state.db_pool, now).await {
                Ok(report) => {
                    let total =
                        report.sessions + report.verification_tokens + report.rate_counters;
                    if total > 0 {
                        info!(
                            sessions = report.sessions,
                            verification_tokens = report.verification_tokens,
                            rate_counters = report.rate_counters,
                            "expired_state_pruned"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "prune_failed");
                }
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        // Nothing to drain: the supervisor stops the sweep loop by dropping
        // `run`'s future, and each prune statement commits on its own, so a
        // cancelled sweep never leaves partial state.
        Ok(())
    }
}
