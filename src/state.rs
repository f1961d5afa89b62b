//! Application state shared across the web and maintenance services.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::mail::Mailer;
use crate::metrics::MetricsTracker;
use crate::personalize::PersonalizationStrategy;
use crate::rag::RetrieverGenerator;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<Config>,
    pub metrics: Arc<MetricsTracker>,
    pub clock: Arc<dyn Clock>,
    pub generator: Arc<dyn RetrieverGenerator>,
    pub mailer: Arc<dyn Mailer>,
    pub personalizer: Arc<dyn PersonalizationStrategy>,
}

impl AppState {
    pub fn new(
        db_pool: SqlitePool,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn RetrieverGenerator>,
        mailer: Arc<dyn Mailer>,
        personalizer: Arc<dyn PersonalizationStrategy>,
    ) -> Self {
        Self {
            db_pool,
            config,
            metrics: Arc::new(MetricsTracker::new()),
            clock,
            generator,
            mailer,
            personalizer,
        }
    }
}
