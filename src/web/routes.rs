//! Public API surface: routes, CORS, and the middleware stack.

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Request},
    middleware,
    response::Response,
    routing::{get, post},
};
use http::{HeaderName, HeaderValue, Method, header};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, debug, warn};

use crate::state::AppState;
use crate::web::middleware::{
    enforce_deadline, recover_panics, request_context, security_headers, track_metrics,
};
use crate::web::{analytics, auth, chat, status};

/// Maximum analytics event body, in bytes.
const MAX_EVENT_BODY_BYTES: usize = 4096;

/// Creates the web server router.
pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/anon-session", post(auth::anon_session))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/session-check", get(auth::session_check))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/chat", post(chat::chat))
        .route("/chat/save", post(chat::save_chat))
        .route("/user/personalize", post(chat::personalize))
        .route(
            "/analytics/event",
            post(analytics::ingest_event).layer(DefaultBodyLimit::max(MAX_EVENT_BODY_BYTES)),
        );

    let router = Router::new()
        .route("/health", get(status::health))
        .route("/metrics", get(status::metrics))
        .nest("/api/v1", api_router)
        .with_state(state.clone());

    // Each successive `.layer()` call wraps the router in a new outermost
    // layer, so they are added innermost-first here to reproduce the
    // "outermost first" stack: every request is counted and timed, then
    // gains a correlation id before anything else can observe it.
    router
        .layer(middleware::from_fn_with_state(state.clone(), enforce_deadline))
        .layer(middleware::from_fn(recover_panics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::debug_span!("http", path = request.uri().path())
                })
                .on_request(())
                .on_body_chunk(())
                .on_eos(())
                .on_response(
                    |response: &Response<Body>, latency: Duration, _span: &Span| {
                        let latency_threshold = if cfg!(debug_assertions) {
                            Duration::from_millis(100)
                        } else {
                            Duration::from_millis(1000)
                        };

                        let (latency_str, status) = (
                            format!("{latency:.2?}"),
                            response.status().as_u16(),
                        );

                        if latency > latency_threshold {
                            warn!(latency = latency_str, status = status, "response_slow");
                        } else {
                            debug!(latency = latency_str, status = status, "response");
                        }
                    },
                )
                .on_failure(
                    |error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                        warn!(
                            error = ?error,
                            latency = format!("{latency:.2?}"),
                            "request_failed"
                        );
                    },
                ),
        )
        .layer(cors_layer(&state))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_context))
        .layer(middleware::from_fn_with_state(state, track_metrics))
}

/// Build the CORS layer from the configured allowlist.
///
/// Origins are matched exactly; an origin absent from the allowlist gets no
/// `Access-Control-Allow-Origin` header, which is what rejects plain-HTTP
/// callers of an HTTPS-only deployment. Test mode without an allowlist is
/// wide open for local harnesses.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = state.config.cors_allowlist();

    if origins.is_empty() && state.config.integration_test_mode {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}
