//! Shared application context
//!
//! One `AppContext` built at startup owns every runtime component and is
//! threaded through handlers as axum state. Tests construct isolated
//! contexts with their own configs; nothing here is a process singleton.

use crate::accounts::AccountPool;
use crate::cache::singleflight::SingleFlight;
use crate::cache::{CacheOptions, LyricsCache};
use crate::config::Config;
use crate::orchestrator::FlightResult;
use crate::providers::kugou::KugouProvider;
use crate::providers::legacy::LegacyProvider;
use crate::providers::ttml::TtmlProvider;
use crate::providers::{MatchOptions, ProviderRegistry};
use crate::ratelimit::{BucketConfig, RequestLimiter};
use crate::services::kugou_client::KugouClient;
use crate::services::legacy_client::LegacyClient;
use crate::services::timed_text_client::TimedTextClient;
use crate::services::token_scraper::TokenScraper;
use crate::stats::AccountStats;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Application state shared across handlers
pub struct AppContext {
    pub config: Config,
    pub cache: Arc<LyricsCache>,
    pub limiter: RequestLimiter,
    pub flights: SingleFlight<FlightResult>,
    pub providers: ProviderRegistry,
    pub pool: Arc<AccountPool>,
    pub stats: Arc<AccountStats>,
    pub shutdown: CancellationToken,
}

pub type SharedContext = Arc<AppContext>;

/// Wire every component together from configuration.
pub fn build_context(config: Config) -> SharedContext {
    let stats = Arc::new(if config.account_stats_path.is_empty() {
        AccountStats::in_memory()
    } else {
        AccountStats::load(Path::new(&config.account_stats_path))
    });

    let pool = Arc::new(AccountPool::new(
        config.accounts(),
        config.circuit_breaker_threshold,
        config.breaker_cooldown(),
        stats.clone(),
    ));

    let scraper = Arc::new(TokenScraper::new(
        config.ttml_token_source_url.clone(),
        Duration::from_secs(config.token_cache_ttl_secs),
    ));
    let timed_text = Arc::new(TimedTextClient::new(pool.clone(), scraper));

    let opts = MatchOptions {
        min_similarity_score: config.min_similarity_score,
        duration_delta_ms: config.duration_match_delta_ms,
    };

    let providers = ProviderRegistry::new();
    providers.register(Arc::new(TtmlProvider::new(
        timed_text,
        config.ttml_base_url.clone(),
        config.ttml_search_path.clone(),
        config.ttml_lyrics_path.clone(),
        opts,
    )));
    providers.register(Arc::new(KugouProvider::new(
        Arc::new(KugouClient::new(
            config.kugou_base_url.clone(),
            config.kugou_song_search_url.clone(),
        )),
        opts,
    )));
    providers.register(Arc::new(LegacyProvider::new(
        Arc::new(LegacyClient::new(
            config.legacy_base_url.clone(),
            config.legacy_search_path.clone(),
            config.legacy_lyrics_path.clone(),
            config.legacy_api_token.clone(),
        )),
        opts,
    )));

    let limiter = RequestLimiter::new(
        BucketConfig {
            per_second: config.rate_limit_per_second,
            burst: config.rate_limit_burst_limit,
        },
        BucketConfig {
            per_second: config.cached_rate_limit_per_second,
            burst: config.cached_rate_limit_burst_limit,
        },
    );

    let cache = Arc::new(LyricsCache::new(CacheOptions {
        compression: config.ff_cache_compression,
    }));

    Arc::new(AppContext {
        config,
        cache,
        limiter,
        flights: SingleFlight::new(),
        providers,
        pool,
        stats,
        shutdown: CancellationToken::new(),
    })
}
