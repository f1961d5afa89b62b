//! Standardized API error envelope.
//!
//! Handlers return typed errors; this module owns the translation to HTTP.
//! Every envelope carries the request id bound to the handling task so
//! operators can correlate a user report with the log stream.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use crate::context::current_request_id;
use crate::store::StoreError;

/// Fixed message for the fatal boundary; internal detail never crosses it.
const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// Machine-readable error code for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidRequest,
    MessageTooLong,
    InvalidSessionId,
    ConsentRequired,
    Unauthorized,
    SessionExpired,
    VerificationFailed,
    TokenExpired,
    RateLimitExceeded,
    ServiceUnavailable,
    RequestTimeout,
    InternalError,
}

/// A typed handler error, rendered into the public envelope on the way out.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    /// Only present on rate-limit denials.
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message)
    }

    pub fn message_too_long(limit: usize) -> Self {
        Self::new(
            ApiErrorCode::MessageTooLong,
            format!("message must be at most {limit} characters"),
        )
    }

    pub fn invalid_session_id() -> Self {
        Self::new(
            ApiErrorCode::InvalidSessionId,
            "session_id must be a UUID v4",
        )
    }

    pub fn consent_required() -> Self {
        Self::new(
            ApiErrorCode::ConsentRequired,
            "consent to data storage is required",
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Unauthorized, message)
    }

    pub fn session_expired() -> Self {
        Self::new(ApiErrorCode::SessionExpired, "session is expired or unknown")
    }

    pub fn verification_failed() -> Self {
        Self::new(
            ApiErrorCode::VerificationFailed,
            "verification token is not valid",
        )
    }

    pub fn token_expired() -> Self {
        Self::new(
            ApiErrorCode::TokenExpired,
            "verification token is expired or already used",
        )
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: ApiErrorCode::RateLimitExceeded,
            message: "rate limit exceeded".to_owned(),
            retry_after: Some(retry_after),
        }
    }

    pub fn service_unavailable() -> Self {
        Self::new(
            ApiErrorCode::ServiceUnavailable,
            "service temporarily unavailable, retry shortly",
        )
    }

    pub fn request_timeout() -> Self {
        Self::new(ApiErrorCode::RequestTimeout, "request timed out")
    }

    pub fn internal() -> Self {
        Self::new(ApiErrorCode::InternalError, INTERNAL_ERROR_MESSAGE)
    }

    fn status_code(&self) -> StatusCode {
        match self.code {
            ApiErrorCode::InvalidRequest | ApiErrorCode::ConsentRequired => {
                StatusCode::BAD_REQUEST
            }
            ApiErrorCode::MessageTooLong | ApiErrorCode::InvalidSessionId => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiErrorCode::Unauthorized
            | ApiErrorCode::SessionExpired
            | ApiErrorCode::VerificationFailed => StatusCode::UNAUTHORIZED,
            ApiErrorCode::TokenExpired => StatusCode::GONE,
            ApiErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::RequestTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = current_request_id();

        let body = match self.code {
            // Public 429 contract: the decision detail, nothing else.
            ApiErrorCode::RateLimitExceeded => json!({
                "detail": {
                    "error": "rate_limited",
                    "retry_after": self.retry_after.unwrap_or(1),
                }
            }),
            ApiErrorCode::InternalError => json!({
                "error": "internal_error",
                "message": INTERNAL_ERROR_MESSAGE,
                "request_id": request_id,
            }),
            _ => json!({
                "error": self.code,
                "message": self.message,
                "request_id": request_id,
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    /// Context-free fallback mapping. Handlers that can give a more specific
    /// answer (expired session vs expired token) match the variant themselves
    /// before reaching for `?`.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::unauthorized("unknown token"),
            StoreError::Expired => ApiError::session_expired(),
            StoreError::AlreadyExists => {
                ApiError::invalid_request("record already exists")
            }
            StoreError::ConsentRequired => ApiError::consent_required(),
            StoreError::InvalidEmail => ApiError::invalid_request("invalid email address"),
            StoreError::Unavailable(e) => {
                tracing::error!(error = %e, "store_unavailable");
                ApiError::service_unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::invalid_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::message_too_long(2000).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::token_expired().status_code(), StatusCode::GONE);
        assert_eq!(
            ApiError::rate_limited(5).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::request_timeout().status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::internal().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
