//! HTTP error mapping
//!
//! Converts the shared error kinds into HTTP responses with
//! `{"error":{"code","message"}}` bodies. Rate-limit refusals carry a
//! structured retry hint in both the body and the `Retry-After` header.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lyrad_common::Error as LyricsError;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request-plane error with a stable kind
    #[error(transparent)]
    Lyrics(#[from] LyricsError),

    /// Served from the negative cache or converted to not-found
    #[error("not found: {reason}")]
    NotFound { reason: String },

    /// Request named a provider that is not registered
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Access token required but absent or wrong
    #[error("access token required")]
    Unauthorized,

    /// Internal invariant failure
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Non-standard status used when the caller went away mid-request
fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Lyrics(e) => match e {
                LyricsError::BadRequest => StatusCode::BAD_REQUEST,
                LyricsError::MatchBelowThreshold { .. }
                | LyricsError::NoMatchInDurationWindow { .. }
                | LyricsError::CacheOnlyMiss => StatusCode::NOT_FOUND,
                LyricsError::UpstreamError { status: 404, .. } => StatusCode::NOT_FOUND,
                LyricsError::UpstreamError { .. }
                | LyricsError::NoHealthyAccount
                | LyricsError::TokenUnavailable(_)
                | LyricsError::ProviderParseError(_) => StatusCode::BAD_GATEWAY,
                LyricsError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                LyricsError::Cancelled => client_closed_request(),
                LyricsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Lyrics(e) => e.code(),
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        let mut headers = HeaderMap::new();
        if let ApiError::Lyrics(LyricsError::RateLimited { retry_after_ms }) = &self {
            error["retryAfterMs"] = json!(retry_after_ms);
            let secs = retry_after_ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                headers.insert("Retry-After", value);
            }
        }

        (status, headers, Json(json!({ "error": error }))).into_response()
    }
}
