//! Common error types for lyrad
//!
//! Every failure the request plane can surface maps to one of these kinds.
//! Each kind carries a stable string code that survives refactors; the HTTP
//! layer keys its status mapping and response bodies off `Error::code`.

use thiserror::Error;

/// Common result type for lyrad operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds shared across the request orchestration plane.
///
/// The enum is `Clone` because single-flight broadcasts deliver the same
/// outcome (success or failure) to every coalesced waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Request had neither a song nor an artist
    #[error("song and artist are both empty")]
    BadRequest,

    /// Best candidate scored below the configured minimum
    #[error("best match score {score:.3} is below threshold {threshold:.3}")]
    MatchBelowThreshold { score: f64, threshold: f64 },

    /// The duration filter rejected every candidate
    #[error("no candidate within {delta_ms}ms of requested duration {duration_ms}ms")]
    NoMatchInDurationWindow { duration_ms: u64, delta_ms: u64 },

    /// Upstream returned a non-success status and retries are exhausted.
    /// `status == 0` means the request never completed (transport failure).
    #[error("upstream error (status {status}): {body}")]
    UpstreamError { status: u16, body: String },

    /// Every configured account is quarantined or out of service
    #[error("no healthy upstream account available")]
    NoHealthyAccount,

    /// Bearer token scrape failed and no cached token exists
    #[error("bearer token unavailable: {0}")]
    TokenUnavailable(String),

    /// Cache-only mode is active and the entry is absent
    #[error("cache miss in cache-only mode")]
    CacheOnlyMiss,

    /// Admission refused by the rate limiter
    #[error("rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Caller context was cancelled while waiting
    #[error("request cancelled")]
    Cancelled,

    /// Artifact was received but could not be parsed into timed lines
    #[error("failed to parse provider artifact: {0}")]
    ProviderParseError(String),

    /// Internal invariant failure (never cached, always 5xx)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable string code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest => "BAD_REQUEST",
            Error::MatchBelowThreshold { .. } => "MATCH_BELOW_THRESHOLD",
            Error::NoMatchInDurationWindow { .. } => "NO_MATCH_IN_DURATION_WINDOW",
            Error::UpstreamError { .. } => "UPSTREAM_ERROR",
            Error::NoHealthyAccount => "NO_HEALTHY_ACCOUNT",
            Error::TokenUnavailable(_) => "TOKEN_UNAVAILABLE",
            Error::CacheOnlyMiss => "CACHE_ONLY_MISS",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::Cancelled => "CANCELLED",
            Error::ProviderParseError(_) => "PROVIDER_PARSE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the orchestrator converts this kind into a negative cache
    /// entry and a 404, rather than propagating a 5xx.
    pub fn is_negative_cacheable(&self) -> bool {
        matches!(
            self,
            Error::MatchBelowThreshold { .. }
                | Error::NoMatchInDurationWindow { .. }
                | Error::UpstreamError { status: 404, .. }
                | Error::CacheOnlyMiss
        )
    }
}
