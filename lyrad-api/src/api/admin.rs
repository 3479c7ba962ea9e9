//! Cache and account introspection endpoints

use crate::cache::fingerprint::fingerprint;
use crate::error::{ApiError, ApiResult};
use crate::orchestrator;
use crate::state::SharedContext;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct AdminParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// `POST /revalidate` body: either a raw fingerprint or the request tuple
#[derive(Debug, Default, Deserialize)]
pub struct RevalidateRequest {
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /cache`: keys, sizes, performance counters, and the dump map.
pub async fn cache_snapshot(
    State(ctx): State<SharedContext>,
    headers: HeaderMap,
    Query(params): Query<AdminParams>,
) -> ApiResult<Json<Value>> {
    guard(&ctx, &headers, params.token.as_deref())?;

    let (entries, stats) = ctx.cache.dump().await;
    Ok(Json(json!({
        "numberOfKeys": stats.number_of_keys,
        "sizeKB": stats.size_bytes as f64 / 1024.0,
        "sizeMB": stats.size_bytes as f64 / (1024.0 * 1024.0),
        "performance": {
            "hits": stats.hits,
            "misses": stats.misses,
            "negativeHits": stats.negative_hits,
            "staleHits": stats.stale_hits,
            "hitRatePercent": stats.hit_rate_percent,
        },
        "entries": entries,
    })))
}

/// `POST /revalidate`: evict one entry so the next request refetches.
pub async fn revalidate(
    State(ctx): State<SharedContext>,
    headers: HeaderMap,
    Json(body): Json<RevalidateRequest>,
) -> ApiResult<Json<Value>> {
    guard(&ctx, &headers, body.token.as_deref())?;

    let fp = match body.fingerprint {
        Some(fp) if !fp.is_empty() => fp,
        _ => {
            let song = body.song.unwrap_or_default();
            let artist = body.artist.unwrap_or_default();
            if song.is_empty() && artist.is_empty() {
                return Err(ApiError::Lyrics(lyrad_common::Error::BadRequest));
            }
            fingerprint(
                body.provider
                    .as_deref()
                    .unwrap_or(&ctx.config.default_provider),
                &song,
                &artist,
                &body.album.unwrap_or_default(),
                body.duration_ms.unwrap_or(0),
            )
        }
    };

    let evicted = orchestrator::revalidate(&ctx, &fp).await;
    Ok(Json(json!({ "fingerprint": fp, "evicted": evicted })))
}

/// `GET /accounts`: rotation health and per-account usage counters.
pub async fn accounts(
    State(ctx): State<SharedContext>,
    headers: HeaderMap,
    Query(params): Query<AdminParams>,
) -> ApiResult<Json<Value>> {
    guard(&ctx, &headers, params.token.as_deref())?;

    let views = ctx.pool.snapshot().await;
    let successes = ctx.stats.snapshot().await;
    Ok(Json(json!({
        "accounts": views,
        "successes": successes,
    })))
}

/// Admin endpoints require the access token whenever one is configured.
fn guard(ctx: &SharedContext, headers: &HeaderMap, query_token: Option<&str>) -> Result<(), ApiError> {
    if ctx.config.cache_access_token.is_empty() {
        return Ok(());
    }
    let header_token = headers.get("x-access-token").and_then(|v| v.to_str().ok());
    let presented = query_token.or(header_token);
    if presented == Some(ctx.config.cache_access_token.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}
