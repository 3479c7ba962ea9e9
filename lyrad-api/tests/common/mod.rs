//! Shared test harness: in-process stub upstreams and request helpers

// each test binary uses a different subset of these helpers
#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path as AxumPath, Query as AxumQuery, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use lyrad_api::{build_context, build_router, Config, SharedContext};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

/// Mutable behavior and counters for the stub upstreams
#[derive(Default)]
pub struct StubState {
    /// Candidates returned by the timed-text search endpoint
    pub songs: Mutex<Vec<Value>>,
    /// TTML body returned by the lyrics endpoint
    pub ttml: Mutex<String>,
    /// Krc candidates returned by the kugou search endpoint
    pub krc_candidates: Mutex<Vec<Value>>,
    /// Raw LRC text served (base64-encoded) by the kugou download endpoint
    pub lrc: Mutex<String>,
    /// Delay applied to timed-text search responses
    pub search_delay_ms: AtomicU32,
    /// media-user-token -> status override for the timed-text search
    pub fail_muts: Mutex<HashMap<String, u16>>,
    /// Successful timed-text search responses, per media-user-token
    pub search_calls: Mutex<HashMap<String, u32>>,
    /// Total successful timed-text search responses
    pub total_search_calls: AtomicU32,
    /// Total timed-text lyrics fetches
    pub lyrics_calls: AtomicU32,
}

impl StubState {
    pub fn searches(&self) -> u32 {
        self.total_search_calls.load(Ordering::SeqCst)
    }

    pub fn searches_for(&self, media_user_token: &str) -> u32 {
        *self
            .search_calls
            .lock()
            .unwrap()
            .get(media_user_token)
            .unwrap_or(&0)
    }

    pub fn set_songs(&self, songs: Vec<Value>) {
        *self.songs.lock().unwrap() = songs;
    }

    pub fn set_ttml(&self, ttml: &str) {
        *self.ttml.lock().unwrap() = ttml.to_string();
    }

    pub fn set_krc_candidates(&self, candidates: Vec<Value>) {
        *self.krc_candidates.lock().unwrap() = candidates;
    }

    pub fn set_lrc(&self, lrc: &str) {
        *self.lrc.lock().unwrap() = lrc.to_string();
    }

    pub fn fail_mut(&self, media_user_token: &str, status: u16) {
        self.fail_muts
            .lock()
            .unwrap()
            .insert(media_user_token.to_string(), status);
    }
}

/// A search candidate for the timed-text stub
pub fn song(id: &str, name: &str, artist: &str, album: &str, duration_ms: u64) -> Value {
    json!({
        "id": id,
        "attributes": {
            "name": name,
            "artistName": artist,
            "albumName": album,
            "durationInMillis": duration_ms,
            "url": format!("https://example.invalid/song/{id}"),
            "isrc": "TEST00000001",
        }
    })
}

/// A minimal word-timed TTML artifact
pub fn sample_ttml() -> String {
    r#"<tt xmlns="http://www.w3.org/ns/ttml" xml:lang="en" timing="word"><body><div>
<p begin="0:10.000" end="0:12.000" ttm:agent="v1"><span begin="0:10.000" end="0:11.000">Hello</span> <span begin="0:11.000" end="0:12.000">world</span></p>
<p begin="0:13.000" end="0:15.000" ttm:agent="v1"><span begin="0:13.000" end="0:15.000">again</span></p>
</div></body></tt>"#
        .to_string()
}

fn fake_jwt() -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256","kid":"stub"}"#);
    let payload = URL_SAFE_NO_PAD.encode(r#"{"iss":"stub","exp":4102444800}"#);
    format!("{header}.{payload}.c3R1Yi1zaWduYXR1cmU")
}

async fn stub_token_page() -> String {
    format!("<html><script>const token=\"{}\";</script></html>", fake_jwt())
}

async fn stub_search(
    State(stub): State<Arc<StubState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let mut_token = headers
        .get("media-user-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if let Some(status) = stub.fail_muts.lock().unwrap().get(&mut_token).copied() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "stubbed failure").into_response();
    }

    let delay = stub.search_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;
    }

    *stub
        .search_calls
        .lock()
        .unwrap()
        .entry(mut_token)
        .or_insert(0) += 1;
    stub.total_search_calls.fetch_add(1, Ordering::SeqCst);

    let songs = stub.songs.lock().unwrap().clone();
    Json(json!({ "results": { "songs": { "data": songs } } })).into_response()
}

async fn stub_lyrics(
    State(stub): State<Arc<StubState>>,
    AxumPath((_storefront, _id)): AxumPath<(String, String)>,
    headers: HeaderMap,
) -> axum::response::Response {
    let mut_token = headers
        .get("media-user-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if let Some(status) = stub.fail_muts.lock().unwrap().get(mut_token).copied() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "stubbed failure").into_response();
    }
    stub.lyrics_calls.fetch_add(1, Ordering::SeqCst);
    let ttml = stub.ttml.lock().unwrap().clone();
    Json(json!({ "data": [ { "attributes": { "ttml": ttml } } ] })).into_response()
}

async fn stub_krc_search(
    State(stub): State<Arc<StubState>>,
    AxumQuery(_params): AxumQuery<HashMap<String, String>>,
) -> Json<Value> {
    let candidates = stub.krc_candidates.lock().unwrap().clone();
    Json(json!({ "status": 200, "candidates": candidates }))
}

async fn stub_krc_download(State(stub): State<Arc<StubState>>) -> Json<Value> {
    let lrc = stub.lrc.lock().unwrap().clone();
    Json(json!({ "content": STANDARD.encode(lrc) }))
}

async fn stub_song_search() -> Json<Value> {
    Json(json!({ "data": { "info": [] } }))
}

/// Start the stub upstream server on an ephemeral port.
pub async fn spawn_stub() -> (SocketAddr, Arc<StubState>) {
    let stub = Arc::new(StubState::default());
    stub.set_ttml(&sample_ttml());

    let router = Router::new()
        .route("/token-page", get(stub_token_page))
        .route("/v1/catalog/:storefront/search", get(stub_search))
        .route(
            "/v1/catalog/:storefront/songs/:id/syllable-lyrics",
            get(stub_lyrics),
        )
        .route("/search", get(stub_krc_search))
        .route("/download", get(stub_krc_download))
        .route("/song-search", get(stub_song_search))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, stub)
}

/// Config wired to the stub, with limits wide enough to stay out of the way
pub fn stub_config(addr: SocketAddr) -> Config {
    let mut config = Config::for_tests();
    config.ttml_base_url = format!("http://{addr}");
    config.ttml_token_source_url = format!("http://{addr}/token-page");
    config.ttml_media_user_tokens = "mut-a1".to_string();
    config.kugou_base_url = format!("http://{addr}");
    config.kugou_song_search_url = format!("http://{addr}/song-search");
    config.rate_limit_per_second = 1000;
    config.rate_limit_burst_limit = 1000;
    config.cached_rate_limit_per_second = 1000;
    config.cached_rate_limit_burst_limit = 1000;
    config
}

/// Build the app under test
pub fn test_app(config: Config) -> (Router, SharedContext) {
    let ctx = build_context(config);
    (build_router(ctx.clone()), ctx)
}

/// Drive one GET through the router
pub async fn get_response(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

/// Drive one GET and parse the JSON body
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get_response(app, uri).await;
    let value = serde_json::from_str(&body).unwrap_or(Value::Null);
    (status, value)
}

/// Drive one POST with a JSON body
pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Performance counters from `/cache`
pub async fn cache_counters(app: &Router) -> Value {
    let (status, body) = get_json(app, "/cache").await;
    assert_eq!(status, StatusCode::OK, "cache snapshot failed: {body}");
    body["performance"].clone()
}
