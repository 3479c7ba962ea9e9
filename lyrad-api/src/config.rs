//! Configuration loading
//!
//! Everything is environment-driven (with matching command-line flags for
//! local runs). Defaults match a small public deployment; tests parse an
//! empty argument list and override fields directly.

use crate::accounts::Account;
use clap::Parser;
use std::time::Duration;
use tracing::warn;

/// Runtime configuration for the lyrad service
#[derive(Parser, Debug, Clone)]
#[command(name = "lyrad-api", about = "Federated lyrics-fetching HTTP service")]
pub struct Config {
    /// Listen address for the HTTP server
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3091")]
    pub bind_addr: String,

    /// Token bucket for requests that will hit an upstream provider
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value_t = 2)]
    pub rate_limit_per_second: u32,
    #[arg(long, env = "RATE_LIMIT_BURST_LIMIT", default_value_t = 5)]
    pub rate_limit_burst_limit: u32,

    /// Token bucket for requests a cache probe classifies as hits
    #[arg(long, env = "CACHED_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub cached_rate_limit_per_second: u32,
    #[arg(long, env = "CACHED_RATE_LIMIT_BURST_LIMIT", default_value_t = 20)]
    pub cached_rate_limit_burst_limit: u32,

    /// Reaper wake interval
    #[arg(long, env = "CACHE_INVALIDATION_INTERVAL_IN_SECONDS", default_value_t = 600)]
    pub cache_invalidation_interval_in_seconds: u64,

    /// TTL for positive cache entries, in seconds
    #[arg(long, env = "LYRICS_CACHE_TTL_IN_SECONDS", default_value_t = 604_800)]
    pub lyrics_cache_ttl_in_seconds: u64,

    /// TTL for negative cache entries, in days
    #[arg(long, env = "NEGATIVE_CACHE_TTL_DAYS", default_value_t = 7)]
    pub negative_cache_ttl_days: u64,

    /// When non-empty: required for admin endpoints and for requests that
    /// reach upstream. Cache hits are always served.
    #[arg(long, env = "CACHE_ACCESS_TOKEN", default_value = "")]
    pub cache_access_token: String,

    /// Minimum candidate score for a match to be accepted
    #[arg(long, env = "MIN_SIMILARITY_SCORE", default_value_t = 0.6)]
    pub min_similarity_score: f64,

    /// Strict duration window applied before scoring
    #[arg(long, env = "DURATION_MATCH_DELTA_MS", default_value_t = 2000)]
    pub duration_match_delta_ms: u64,

    /// Consecutive failures that quarantine an account
    #[arg(long, env = "CIRCUIT_BREAKER_THRESHOLD", default_value_t = 5)]
    pub circuit_breaker_threshold: u32,

    /// Quarantine duration, in seconds
    #[arg(long, env = "CIRCUIT_BREAKER_COOLDOWN_SECS", default_value_t = 300)]
    pub circuit_breaker_cooldown_secs: u64,

    /// Provider used when the request does not name one
    #[arg(long, env = "DEFAULT_PROVIDER", default_value = "ttml")]
    pub default_provider: String,

    #[arg(long, env = "TTML_BASE_URL", default_value = "https://amp-api.music.apple.com")]
    pub ttml_base_url: String,
    #[arg(long, env = "TTML_SEARCH_PATH", default_value = "/v1/catalog/{storefront}/search")]
    pub ttml_search_path: String,
    #[arg(
        long,
        env = "TTML_LYRICS_PATH",
        default_value = "/v1/catalog/{storefront}/songs/{id}/syllable-lyrics"
    )]
    pub ttml_lyrics_path: String,
    #[arg(long, env = "TTML_STOREFRONT", default_value = "us")]
    pub ttml_storefront: String,

    /// Deprecated single-account form; accepted with a warning
    #[arg(long, env = "TTML_MEDIA_USER_TOKEN", default_value = "")]
    pub ttml_media_user_token: String,

    /// Comma-separated media-user-tokens, one account each
    #[arg(long, env = "TTML_MEDIA_USER_TOKENS", default_value = "")]
    pub ttml_media_user_tokens: String,

    /// Page the bearer token is scraped from
    #[arg(long, env = "TTML_TOKEN_SOURCE_URL", default_value = "")]
    pub ttml_token_source_url: String,

    /// Fallback bearer TTL when the scraped token has no readable expiry
    #[arg(long, env = "TOKEN_CACHE_TTL_SECS", default_value_t = 21_600)]
    pub token_cache_ttl_secs: u64,

    #[arg(long, env = "KUGOU_BASE_URL", default_value = "http://lyrics.kugou.com")]
    pub kugou_base_url: String,
    #[arg(
        long,
        env = "KUGOU_SONG_SEARCH_URL",
        default_value = "http://mobilecdn.kugou.com/api/v3/search/song"
    )]
    pub kugou_song_search_url: String,

    /// Legacy backend; empty leaves the provider registered but unusable
    #[arg(long, env = "LEGACY_BASE_URL", default_value = "")]
    pub legacy_base_url: String,
    #[arg(long, env = "LEGACY_SEARCH_PATH", default_value = "/search")]
    pub legacy_search_path: String,
    #[arg(long, env = "LEGACY_LYRICS_PATH", default_value = "/lyrics")]
    pub legacy_lyrics_path: String,
    #[arg(long, env = "LEGACY_API_TOKEN", default_value = "")]
    pub legacy_api_token: String,

    /// JSON file for per-account counters; empty keeps them in memory
    #[arg(long, env = "ACCOUNT_STATS_PATH", default_value = "")]
    pub account_stats_path: String,

    /// Feature flag: gzip cache payloads above the size threshold
    #[arg(long, env = "FF_CACHE_COMPRESSION", default_value_t = false)]
    pub ff_cache_compression: bool,

    /// Feature flag: never fetch upstream, serve only what is cached
    #[arg(long, env = "FF_CACHE_ONLY_MODE", default_value_t = false)]
    pub ff_cache_only_mode: bool,
}

impl Config {
    /// Parse from the process environment
    pub fn from_env() -> Self {
        Self::parse()
    }

    /// Defaults with no environment lookups, for tests
    pub fn for_tests() -> Self {
        Self::parse_from(["lyrad-api"])
    }

    /// Assemble the account list from configuration.
    ///
    /// Each entry of the comma-separated token list becomes one account; an
    /// empty entry yields an out-of-service account that stays visible for
    /// monitoring. The deprecated single-token variable is folded in as the
    /// last account, with a warning.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts = Vec::new();
        if !self.ttml_media_user_tokens.is_empty() {
            for (idx, token) in self.ttml_media_user_tokens.split(',').enumerate() {
                let token = token.trim();
                accounts.push(Account {
                    name: format!("account-{}", idx + 1),
                    media_user_token: token.to_string(),
                    storefront: self.ttml_storefront.clone(),
                    out_of_service: token.is_empty(),
                });
            }
        }
        if !self.ttml_media_user_token.is_empty() {
            warn!("TTML_MEDIA_USER_TOKEN is deprecated; use TTML_MEDIA_USER_TOKENS");
            accounts.push(Account {
                name: format!("account-{}", accounts.len() + 1),
                media_user_token: self.ttml_media_user_token.trim().to_string(),
                storefront: self.ttml_storefront.clone(),
                out_of_service: self.ttml_media_user_token.trim().is_empty(),
            });
        }
        accounts
    }

    pub fn positive_ttl(&self) -> Duration {
        Duration::from_secs(self.lyrics_cache_ttl_in_seconds)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_cache_ttl_days * 24 * 60 * 60)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.cache_invalidation_interval_in_seconds.max(1))
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_cooldown_secs)
    }
}
