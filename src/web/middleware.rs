//! Request-lifecycle middleware: correlation, security headers, recovery,
//! metrics, and the end-to-end deadline.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{Instrument, error, info_span};

use crate::clock::generate_uuid;
use crate::context::with_request_id;
use crate::state::AppState;
use crate::web::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A client-supplied request id is adopted only when it is short and plain;
/// anything else is replaced so log streams stay parseable.
fn valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Correlation middleware. Runs before every handler body: adopts or mints
/// the request id, binds it to the task-local context (which the logger and
/// the error envelope read), and echoes it on the response.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| valid_request_id(id))
        .map(str::to_owned)
        .unwrap_or_else(generate_uuid);

    request.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id).expect("validated request id"),
    );

    let span = info_span!("request", request_id = %request_id);
    let mut response =
        with_request_id(request_id.clone(), next.run(request).instrument(span)).await;

    response.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id).expect("validated request id"),
    );
    response
}

/// Defensive response headers, attached to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );
    headers.insert(
        header::HeaderName::from_static("x-xss-protection"),
        HeaderValue::from_static("1; mode=block"),
    );
    response
}

/// Global recovery boundary: a panic anywhere below becomes the redacted 500
/// envelope, and the panic detail goes to the log stream with the request id.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(
                method = %method,
                path = %path,
                panic_message = %detail,
                "unhandled_exception"
            );
            ApiError::internal().into_response()
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Process-local request accounting for the `/metrics` endpoint.
pub async fn track_metrics(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    state.metrics.record_request();
    let started = Instant::now();

    let response = next.run(request).await;

    state
        .metrics
        .record_response_time(started.elapsed().as_secs_f64() * 1000.0);
    if response.status().is_server_error() {
        state.metrics.record_error();
    }
    response
}

/// End-to-end request deadline. Expiry aborts whatever is in flight below
/// (the dropped future cancels its downstream call) and returns the timeout
/// envelope.
pub async fn enforce_deadline(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(state.config.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::request_timeout().into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_validation() {
        assert!(valid_request_id("abc-123"));
        assert!(valid_request_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(valid_request_id("a.b_c-d"));
        assert!(!valid_request_id(""));
        assert!(!valid_request_id("has spaces"));
        assert!(!valid_request_id("new\nline"));
        assert!(!valid_request_id(&"x".repeat(129)));
    }
}
