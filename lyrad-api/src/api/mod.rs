//! HTTP surface
//!
//! Routes:
//! - `GET /getLyrics` - default provider
//! - `GET /:provider/getLyrics` - explicit provider
//! - `GET /cache` - cache snapshot (token-guarded)
//! - `POST /revalidate` - evict one fingerprint (token-guarded)
//! - `GET /accounts` - account health and usage (token-guarded)
//! - `GET /health` - liveness, unguarded

pub mod admin;
pub mod health;
pub mod lyrics;

use crate::state::SharedContext;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the application router
pub fn build_router(ctx: SharedContext) -> Router {
    Router::new()
        .route("/getLyrics", get(lyrics::get_lyrics))
        .route("/:provider/getLyrics", get(lyrics::get_lyrics_for_provider))
        .route("/cache", get(admin::cache_snapshot))
        .route("/revalidate", post(admin::revalidate))
        .route("/accounts", get(admin::accounts))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
