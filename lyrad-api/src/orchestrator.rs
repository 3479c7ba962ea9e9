//! Request orchestration
//!
//! Binds the cache, rate limiter, single-flight coalescer, and provider
//! registry together for one lyrics request: probe, classify, admit, serve
//! from cache when fresh, otherwise coalesce one upstream fetch per
//! fingerprint and cache its outcome. Lock order outer to inner is rate
//! limiter, coalescer, cache, account pool; none is held across I/O.

use crate::cache::fingerprint::fingerprint;
use crate::cache::singleflight::Flight;
use crate::cache::{CachedLyrics, CacheState, Lookup};
use crate::error::ApiError;
use crate::providers::{LyricsProvider, LyricsQuery};
use crate::ratelimit::Admission;
use crate::state::SharedContext;
use lyrad_common::{Error, LyricsResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One parsed lyrics request
#[derive(Debug, Clone)]
pub struct LyricsRequest {
    /// Resolved provider name
    pub provider: String,
    pub query: LyricsQuery,
    /// Per-request cache-only marker
    pub cache_only: bool,
    /// Access token presented by the caller, when any
    pub access_token: Option<String>,
}

/// Outcome broadcast through the single-flight group
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Found(Arc<LyricsResult>),
    Negative { reason: String },
}

/// The value type coalesced per fingerprint
pub type FlightResult = Result<FetchOutcome, Error>;

/// Handle one lyrics request end to end.
pub async fn handle_lyrics(
    ctx: &SharedContext,
    request: &LyricsRequest,
) -> Result<Arc<LyricsResult>, ApiError> {
    request.query.validate()?;
    let provider = ctx
        .providers
        .resolve(&request.provider)
        .ok_or_else(|| ApiError::UnknownProvider(request.provider.clone()))?;

    let q = &request.query;
    let fp = fingerprint(&request.provider, &q.song, &q.artist, &q.album, q.duration_ms);
    let cache_only = ctx.config.ff_cache_only_mode || request.cache_only;

    // advisory probe drives admission; the decision stands even if the
    // actual state disagrees afterwards
    let probe = ctx.cache.peek_state(&fp).await;
    let class = match probe {
        CacheState::FreshPositive | CacheState::FreshNegative => Admission::Cached,
        CacheState::Miss | CacheState::Stale => Admission::Upstream,
    };
    ctx.limiter.admit(class).map_err(ApiError::from)?;

    match ctx.cache.get(&fp).await {
        Lookup::FreshPositive(cached) => {
            ctx.cache.note_hit();
            debug!(fingerprint = %fp, "cache hit");
            return decode_cached(cached);
        }
        Lookup::FreshNegative { reason } => {
            ctx.cache.note_negative_hit();
            debug!(fingerprint = %fp, "negative cache hit");
            return Err(ApiError::NotFound { reason });
        }
        Lookup::Stale(cached) if !cache_only => {
            // stale-while-revalidate: serve the old value, refresh behind
            ctx.cache.note_stale_hit();
            info!(fingerprint = %fp, "serving stale entry while revalidating");
            spawn_revalidation(ctx.clone(), request.clone(), fp.clone());
            return decode_cached(cached);
        }
        _ => {}
    }

    if cache_only {
        ctx.cache.note_miss();
        ctx.cache
            .put_negative(
                &fp,
                "cache miss in cache-only mode",
                &request.provider,
                ctx.config.negative_ttl(),
            )
            .await;
        return Err(ApiError::Lyrics(Error::CacheOnlyMiss));
    }

    // the api-key gate applies to the miss path only; hits above were
    // served without it
    if !ctx.config.cache_access_token.is_empty()
        && request.access_token.as_deref() != Some(ctx.config.cache_access_token.as_str())
    {
        return Err(ApiError::Unauthorized);
    }

    let outcome = ctx
        .flights
        .run(&fp, || lead_fetch(ctx, request, &fp, provider.clone()))
        .await
        .map_err(ApiError::from)?;

    match outcome {
        Flight::Led(result) => finish(result),
        Flight::Joined(result) => {
            // the leader warmed the cache; waiters are served from it
            match ctx.cache.get(&fp).await {
                Lookup::FreshPositive(cached) => {
                    ctx.cache.note_hit();
                    decode_cached(cached)
                }
                Lookup::FreshNegative { reason } => {
                    ctx.cache.note_negative_hit();
                    Err(ApiError::NotFound { reason })
                }
                // reaped or evicted in the meantime: the broadcast value
                // is still authoritative
                _ => finish(result),
            }
        }
    }
}

/// Evict one fingerprint (admin `/revalidate`).
pub async fn revalidate(ctx: &SharedContext, fp: &str) -> bool {
    let evicted = ctx.cache.invalidate(fp).await;
    info!(fingerprint = %fp, evicted, "revalidation requested");
    evicted
}

/// The single upstream fetch for one fingerprint: re-check the cache under
/// flight leadership, call the provider, store the outcome.
async fn lead_fetch(
    ctx: &SharedContext,
    request: &LyricsRequest,
    fp: &str,
    provider: Arc<dyn LyricsProvider>,
) -> FlightResult {
    match ctx.cache.get(fp).await {
        Lookup::FreshPositive(cached) => {
            ctx.cache.note_hit();
            return match decode_payload(&cached) {
                Ok(result) => Ok(FetchOutcome::Found(result)),
                Err(e) => Err(e),
            };
        }
        Lookup::FreshNegative { reason } => {
            ctx.cache.note_negative_hit();
            return Ok(FetchOutcome::Negative { reason });
        }
        _ => ctx.cache.note_miss(),
    }

    match provider.fetch(&request.query).await {
        Ok(result) => {
            let payload = serde_json::to_vec(&result)
                .map_err(|e| Error::Internal(format!("result serialization: {e}")))?;
            ctx.cache
                .put_positive(
                    fp,
                    &payload,
                    result.score,
                    result.track_duration_ms,
                    &result.language,
                    result.is_rtl,
                    &request.provider,
                    ctx.config.positive_ttl(),
                )
                .await;
            info!(
                provider = %request.provider,
                score = result.score,
                lines = result.lines.len(),
                "lyrics fetched and cached"
            );
            Ok(FetchOutcome::Found(Arc::new(result)))
        }
        Err(e) if e.is_negative_cacheable() => {
            let reason = e.to_string();
            ctx.cache
                .put_negative(fp, &reason, &request.provider, ctx.config.negative_ttl())
                .await;
            info!(provider = %request.provider, reason = %reason, "negative result cached");
            Ok(FetchOutcome::Negative { reason })
        }
        Err(e) => {
            warn!(provider = %request.provider, error = %e, "provider fetch failed");
            Err(e)
        }
    }
}

/// Detached stale-entry refresh; runs under the same single-flight group
/// so it never races a foreground fetch for the same fingerprint.
fn spawn_revalidation(ctx: SharedContext, request: LyricsRequest, fp: String) {
    tokio::spawn(async move {
        let Some(provider) = ctx.providers.resolve(&request.provider) else {
            return;
        };
        let outcome = ctx
            .flights
            .run(&fp, || lead_fetch(&ctx, &request, &fp, provider.clone()))
            .await;
        if let Err(e) = outcome {
            debug!(fingerprint = %fp, error = %e, "background revalidation did not complete");
        }
    });
}

fn finish(result: FlightResult) -> Result<Arc<LyricsResult>, ApiError> {
    match result {
        Ok(FetchOutcome::Found(lyrics)) => Ok(lyrics),
        Ok(FetchOutcome::Negative { reason }) => Err(ApiError::NotFound { reason }),
        Err(e) => Err(ApiError::Lyrics(e)),
    }
}

fn decode_cached(cached: CachedLyrics) -> Result<Arc<LyricsResult>, ApiError> {
    decode_payload(&cached).map_err(ApiError::Lyrics)
}

fn decode_payload(cached: &CachedLyrics) -> Result<Arc<LyricsResult>, Error> {
    serde_json::from_slice::<LyricsResult>(&cached.payload)
        .map(Arc::new)
        .map_err(|e| Error::Internal(format!("cached payload deserialization: {e}")))
}
