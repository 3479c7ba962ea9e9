//! Lyrics endpoint handlers

use crate::error::{ApiError, ApiResult};
use crate::orchestrator::{self, LyricsRequest};
use crate::providers::LyricsQuery;
use crate::state::SharedContext;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lyrad_common::{Error, LyricsResult};
use serde::Deserialize;

/// Query parameters for `GET /getLyrics`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LyricsParams {
    #[serde(default)]
    pub song: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration_ms: u64,
    /// Serve only from cache, even when an upstream fetch would succeed
    #[serde(default)]
    pub cache_only: bool,
    /// `raw` (default) returns the provider-native artifact; `lines`
    /// returns the normalized timed-line JSON
    #[serde(default)]
    pub format: Option<String>,
    /// Access token; `x-access-token` header is also accepted
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /getLyrics` with the configured default provider
pub async fn get_lyrics(
    State(ctx): State<SharedContext>,
    headers: HeaderMap,
    Query(params): Query<LyricsParams>,
) -> ApiResult<Response> {
    let provider = ctx.config.default_provider.clone();
    serve(ctx, provider, headers, params).await
}

/// `GET /:provider/getLyrics`
pub async fn get_lyrics_for_provider(
    State(ctx): State<SharedContext>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Query(params): Query<LyricsParams>,
) -> ApiResult<Response> {
    serve(ctx, provider, headers, params).await
}

async fn serve(
    ctx: SharedContext,
    provider: String,
    headers: HeaderMap,
    params: LyricsParams,
) -> ApiResult<Response> {
    let token = params.token.clone().or_else(|| {
        headers
            .get("x-access-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let request = LyricsRequest {
        provider,
        query: LyricsQuery {
            song: params.song.trim().to_string(),
            artist: params.artist.trim().to_string(),
            album: params.album.trim().to_string(),
            duration_ms: params.duration_ms,
        },
        cache_only: params.cache_only,
        access_token: token,
    };

    let result = orchestrator::handle_lyrics(&ctx, &request).await?;
    render(&result, params.format.as_deref())
}

/// Render the result as the raw artifact (default) or the parsed lines.
fn render(result: &LyricsResult, format: Option<&str>) -> ApiResult<Response> {
    match format.unwrap_or("raw") {
        "lines" => {
            if result.lines.is_empty() {
                // the artifact was stored but never parsed into lines
                return Err(ApiError::Lyrics(Error::ProviderParseError(
                    "artifact has no parsed lines".to_string(),
                )));
            }
            Ok(Json(result.clone()).into_response())
        }
        _ => Ok((
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            result.raw_artifact.clone(),
        )
            .into_response()),
    }
}
