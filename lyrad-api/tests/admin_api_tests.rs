//! Admission, cache administration, and protection tests

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use std::time::Duration;

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn upstream_family_refuses_beyond_burst() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![]);
    let mut config = stub_config(addr);
    config.rate_limit_per_second = 1;
    config.rate_limit_burst_limit = 2;
    let (app, _ctx) = test_app(config);

    // distinct songs so each request classifies as an upstream miss
    let (s1, _) = get_json(&app, "/getLyrics?song=One&artist=X").await;
    let (s2, _) = get_json(&app, "/getLyrics?song=Two&artist=X").await;
    let (s3, body) = get_json(&app, "/getLyrics?song=Three&artist=X").await;

    // the first two reach upstream (and negative-cache a 404); the third
    // is refused before any provider work happens
    assert_eq!(s1, StatusCode::NOT_FOUND);
    assert_eq!(s2, StatusCode::NOT_FOUND);
    assert_eq!(s3, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert!(body["error"]["retryAfterMs"].as_u64().unwrap() > 0);
    assert_eq!(stub.searches(), 2);
}

#[tokio::test]
async fn cache_hits_ride_the_larger_bucket() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Hit Song", "Band", "Album", 0)]);
    let mut config = stub_config(addr);
    config.rate_limit_per_second = 1;
    config.rate_limit_burst_limit = 1;
    config.cached_rate_limit_per_second = 10;
    config.cached_rate_limit_burst_limit = 20;
    let (app, _ctx) = test_app(config);

    let uri = "/getLyrics?song=Hit%20Song&artist=Band";
    let (status, _) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);

    // the upstream bucket is drained, but hits classify as cached
    for _ in 0..10 {
        let (status, _) = get_response(&app, uri).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(stub.searches(), 1);
}

// =============================================================================
// Cache-only mode
// =============================================================================

#[tokio::test]
async fn cache_only_miss_is_404_and_negative_cached() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Cold Song", "Band", "Album", 0)]);
    let (app, _ctx) = test_app(stub_config(addr));

    let (status, body) =
        get_json(&app, "/getLyrics?song=Cold%20Song&artist=Band&cache_only=true").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CACHE_ONLY_MISS");
    assert_eq!(stub.searches(), 0);

    // the miss was negative-cached; a later normal request serves it
    let (status, body) = get_json(&app, "/getLyrics?song=Cold%20Song&artist=Band").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("cache-only"));
    assert_eq!(stub.searches(), 0);
}

#[tokio::test]
async fn global_cache_only_flag_blocks_upstream_fetches() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Warm Song", "Band", "Album", 0)]);

    let mut config = stub_config(addr);
    config.ff_cache_only_mode = true;
    let (app, _ctx) = test_app(config);

    let (status, body) = get_json(&app, "/getLyrics?song=Warm%20Song&artist=Band").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CACHE_ONLY_MISS");
    assert_eq!(stub.searches(), 0);
}

// =============================================================================
// Access-token protection
// =============================================================================

#[tokio::test]
async fn admin_endpoints_require_the_token_when_configured() {
    let (addr, _stub) = spawn_stub().await;
    let mut config = stub_config(addr);
    config.cache_access_token = "sekrit".to_string();
    let (app, _ctx) = test_app(config);

    let (status, _) = get_json(&app, "/cache").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = get_json(&app, "/accounts").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_json(&app, "/cache?token=sekrit").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_json(&app, "/accounts?token=sekrit").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn miss_path_requires_token_but_hits_bypass_it() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Guarded Song", "Band", "Album", 0)]);
    let mut config = stub_config(addr);
    config.cache_access_token = "sekrit".to_string();
    let (app, _ctx) = test_app(config);

    let uri = "/getLyrics?song=Guarded%20Song&artist=Band";

    // a miss without the token is refused before reaching upstream
    let (status, body) = get_json(&app, uri).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(stub.searches(), 0);

    // with the token the fetch goes through and warms the cache
    let (status, _) = get_response(&app, &format!("{uri}&token=sekrit")).await;
    assert_eq!(status, StatusCode::OK);

    // cached content stays served without any token
    let (status, _) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.searches(), 1);
}

// =============================================================================
// /cache and /revalidate
// =============================================================================

#[tokio::test]
async fn cache_snapshot_reports_keys_and_sizes() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Dump Song", "Band", "Album", 0)]);
    let (app, _ctx) = test_app(stub_config(addr));

    let (status, _) = get_response(&app, "/getLyrics?song=Dump%20Song&artist=Band").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(&app, "/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["numberOfKeys"], 1);
    assert!(body["sizeKB"].as_f64().unwrap() > 0.0);
    assert!(body["sizeMB"].as_f64().unwrap() > 0.0);
    let entries = body["entries"].as_object().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = entries.values().next().unwrap();
    assert_eq!(entry["provider"], "ttml");
    assert_eq!(entry["kind"], "positive");
}

#[tokio::test]
async fn revalidate_evicts_and_forces_a_refetch() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Evict Song", "Band", "Album", 0)]);
    let (app, _ctx) = test_app(stub_config(addr));

    let uri = "/getLyrics?song=Evict%20Song&artist=Band";
    let (status, _) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.searches(), 1);

    let (status, body) = post_json(
        &app,
        "/revalidate",
        json!({ "song": "Evict Song", "artist": "Band" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["evicted"], true);

    // eviction by raw fingerprint is also accepted
    let fp = body["fingerprint"].as_str().unwrap().to_string();
    let (status, body) = post_json(&app, "/revalidate", json!({ "fingerprint": fp })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["evicted"], false);

    let (status, _) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.searches(), 2);
}

// =============================================================================
// Stale-while-revalidate
// =============================================================================

#[tokio::test]
async fn stale_entries_are_served_while_refetching() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Stale Song", "Band", "Album", 0)]);
    let mut config = stub_config(addr);
    config.lyrics_cache_ttl_in_seconds = 1;
    let (app, _ctx) = test_app(config);

    let uri = "/getLyrics?song=Stale%20Song&artist=Band";
    let (status, first_body) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    // expired but not reaped: the old value is served immediately
    let (status, body) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, first_body);

    let perf = cache_counters(&app).await;
    assert_eq!(perf["staleHits"], 1);

    // the background revalidation refreshed from upstream
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(stub.searches(), 2);
}

// =============================================================================
// Input validation
// =============================================================================

#[tokio::test]
async fn empty_song_and_artist_is_bad_request() {
    let (addr, _stub) = spawn_stub().await;
    let (app, _ctx) = test_app(stub_config(addr));

    let (status, body) = get_json(&app, "/getLyrics?album=OnlyAlbum").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_provider_is_rejected() {
    let (addr, _stub) = spawn_stub().await;
    let (app, _ctx) = test_app(stub_config(addr));

    let (status, body) = get_json(&app, "/nope/getLyrics?song=A&artist=B").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNKNOWN_PROVIDER");
}

#[tokio::test]
async fn health_needs_no_token() {
    let (addr, _stub) = spawn_stub().await;
    let mut config = stub_config(addr);
    config.cache_access_token = "sekrit".to_string();
    let (app, _ctx) = test_app(config);

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lyrad-api");
}
