#![allow(dead_code)] // Each test binary uses a different slice of these helpers.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use docent::clock::FixedClock;
use docent::config::{Config, RateLimitConfig};
use docent::mail::DisabledMailer;
use docent::personalize::TierStrategy;
use docent::rag::RetrieverGenerator;
use docent::rag::fixture::FixtureGenerator;
use docent::state::AppState;
use docent::store;
use docent::web::create_router;

/// A fully wired application over an in-memory store, with a manually
/// advanced clock.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub clock: Arc<FixedClock>,
}

/// Integration-test-mode configuration (fixture generator semantics, halved
/// rate limits over 10s windows, mail disabled).
pub fn test_config() -> Config {
    Config {
        log_level: "debug".to_owned(),
        port: 0,
        database_url: "sqlite::memory:".to_owned(),
        db_max_connections: 1,
        integration_test_mode: true,
        secret_key: None,
        cors_origins: None,
        session_ttl_seconds: 86400,
        session_refresh_grace_seconds: 60,
        verification_ttl_seconds: 600,
        email_enabled: false,
        shutdown_timeout: Duration::from_secs(10),
        request_timeout: Duration::from_secs(30),
        generator_base_url: "http://localhost:8001".to_owned(),
        rate_limit: RateLimitConfig::default(),
    }
}

/// Production-shaped configuration for boundary tests (CORS, validation).
pub fn production_config() -> Config {
    Config {
        integration_test_mode: false,
        secret_key: Some("0123456789abcdef0123456789abcdef".to_owned()),
        cors_origins: Some("https://example.com".to_owned()),
        ..test_config()
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), Arc::new(FixtureGenerator)).await
}

pub async fn spawn_app_with(
    config: Config,
    generator: Arc<dyn RetrieverGenerator>,
) -> TestApp {
    let pool = store::init(&config.database_url, config.db_max_connections)
        .await
        .expect("store init failed");

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
    ));

    let state = AppState::new(
        pool,
        Arc::new(config),
        clock.clone(),
        generator,
        Arc::new(DisabledMailer),
        Arc::new(TierStrategy),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
    }
}

impl TestApp {
    /// POST a JSON body, optionally with a bearer token.
    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = request.body(Body::from(body.to_string())).unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().method("GET").uri(path);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = request.body(Body::empty()).unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Drive signup + verify for an address, returning the session token.
    pub async fn signed_in_user(&self, email: &str) -> String {
        let response = self
            .post_json(
                "/api/v1/auth/signup",
                &serde_json::json!({ "email": email, "consent_data_storage": true }),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "signup failed");

        let response = self
            .post_json(
                "/api/v1/auth/verify",
                &serde_json::json!({
                    "token": docent::store::verification::INTEGRATION_TEST_TOKEN
                }),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "verify failed");

        let body = read_json(response).await;
        body["session_token"].as_str().unwrap().to_owned()
    }
}

/// Collect a response body as JSON.
pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
