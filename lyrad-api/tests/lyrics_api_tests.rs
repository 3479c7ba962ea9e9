//! End-to-end scenarios against stub upstream providers
//!
//! Covers exact-hit caching, threshold rejection with negative caching,
//! duration filtering, single-flight coalescing, account rotation on 429
//! with quarantine, and LRC credit-line normalization.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::time::Duration;

// =============================================================================
// E1: exact-hit caching
// =============================================================================

#[tokio::test]
async fn exact_hit_is_cached_after_one_upstream_fetch() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Shape of You", "Ed Sheeran", "Divide", 233_712)]);
    let (app, _ctx) = test_app(stub_config(addr));

    let uri = "/getLyrics?song=Shape%20of%20You&artist=Ed%20Sheeran&album=Divide&duration_ms=233712";

    let (status, body) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, sample_ttml());
    assert_eq!(stub.searches(), 1);
    assert_eq!(stub.lyrics_calls.load(Ordering::SeqCst), 1);

    let perf = cache_counters(&app).await;
    assert_eq!(perf["misses"], 1);

    // second identical request: served from cache, no upstream traffic
    let (status, body) = get_response(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, sample_ttml());
    assert_eq!(stub.searches(), 1);
    assert_eq!(stub.lyrics_calls.load(Ordering::SeqCst), 1);

    let perf = cache_counters(&app).await;
    assert_eq!(perf["hits"], 1);
    assert_eq!(perf["misses"], 1);
}

// =============================================================================
// E2: threshold rejection inserts a negative entry
// =============================================================================

#[tokio::test]
async fn below_threshold_match_is_negative_cached() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("9", "Shape of My Heart", "Sting", "Ten Summoner's Tales", 0)]);
    let (app, _ctx) = test_app(stub_config(addr));

    let uri = "/getLyrics?song=Shape%20of%20You&artist=Ed%20Sheeran";

    let (status, body) = get_json(&app, uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("below threshold"), "message: {message}");
    assert_eq!(stub.searches(), 1);

    // the negative entry now answers without upstream traffic
    let (status, body) = get_json(&app, uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"].as_str().unwrap().contains("below threshold"));
    assert_eq!(stub.searches(), 1);

    let perf = cache_counters(&app).await;
    assert_eq!(perf["negativeHits"], 1);
    assert_eq!(perf["misses"], 1);
}

// =============================================================================
// E3: duration filter picks the in-window candidate
// =============================================================================

#[tokio::test]
async fn duration_filter_rejects_out_of_window_candidates() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![
        song("1", "Target Song", "Target Artist", "Album", 200_000),
        song("2", "Target Song", "Target Artist", "Album", 229_000),
    ]);
    let (app, _ctx) = test_app(stub_config(addr));

    let (status, body) = get_json(
        &app,
        "/getLyrics?song=Target%20Song&artist=Target%20Artist&duration_ms=230000&format=lines",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trackDurationMs"], 229_000);
    assert!(!body["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_duration_window_is_404() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Target Song", "Target Artist", "Album", 100_000)]);
    let (app, _ctx) = test_app(stub_config(addr));

    let (status, body) = get_json(
        &app,
        "/getLyrics?song=Target%20Song&artist=Target%20Artist&duration_ms=230000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("duration"));
}

// =============================================================================
// E4: single-flight coalescing
// =============================================================================

#[tokio::test]
async fn concurrent_identical_requests_coalesce_to_one_fetch() {
    let (addr, stub) = spawn_stub().await;
    stub.set_songs(vec![song("1", "Coalesce", "One Band", "Album", 180_000)]);
    stub.search_delay_ms.store(500, Ordering::SeqCst);
    let (app, _ctx) = test_app(stub_config(addr));

    let uri = "/getLyrics?song=Coalesce&artist=One%20Band&duration_ms=180000";

    let mut handles = Vec::new();
    for _ in 0..50 {
        let app = app.clone();
        let uri = uri.to_string();
        handles.push(tokio::spawn(async move { get_response(&app, &uri).await }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }

    assert!(bodies.iter().all(|b| b == &bodies[0]), "responses must be byte-identical");
    assert_eq!(stub.searches(), 1, "upstream must be fetched exactly once");
    assert_eq!(stub.lyrics_calls.load(Ordering::SeqCst), 1);

    let perf = cache_counters(&app).await;
    assert_eq!(perf["misses"], 1);
    assert_eq!(perf["hits"], 49);
}

// =============================================================================
// E5: account rotation on 429 and quarantine after threshold
// =============================================================================

async fn account_view(app: &axum::Router, name: &str) -> Value {
    let (status, body) = get_json(app, "/accounts").await;
    assert_eq!(status, StatusCode::OK);
    body["accounts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["name"] == name)
        .cloned()
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn rate_limited_account_is_skipped_then_quarantined() {
    let (addr, stub) = spawn_stub().await;
    stub.fail_mut("mut-a1", 429);

    let mut config = stub_config(addr);
    config.ttml_media_user_tokens = "mut-a1,mut-a2".to_string();
    // one request makes two upstream calls (search + lyrics), each of which
    // records one a1 failure before rotating to a2
    config.circuit_breaker_threshold = 3;
    config.circuit_breaker_cooldown_secs = 1;
    let (app, _ctx) = test_app(config);

    // request 1: a1 is rate-limited on both calls, a2 answers both
    stub.set_songs(vec![song("1", "Song One", "Band", "Album", 0)]);
    let (status, _) = get_response(&app, "/getLyrics?song=Song%20One&artist=Band").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.searches_for("mut-a1"), 0);
    assert_eq!(stub.searches_for("mut-a2"), 1);
    let view = account_view(&app, "account-1").await;
    assert_eq!(view["consecutiveFailures"], 2);
    assert!(view["quarantinedForSecs"].is_null());

    // request 2: the third failure opens the breaker
    stub.set_songs(vec![song("2", "Song Two", "Band", "Album", 0)]);
    let (status, _) = get_response(&app, "/getLyrics?song=Song%20Two&artist=Band").await;
    assert_eq!(status, StatusCode::OK);
    let view = account_view(&app, "account-1").await;
    assert_eq!(view["consecutiveFailures"], 0);
    assert!(view["quarantinedForSecs"].is_number(), "account-1 should be quarantined: {view}");

    // request 3: starts directly on a2 while a1 sits out the cooldown
    let a2_searches = stub.searches_for("mut-a2");
    stub.set_songs(vec![song("3", "Song Three", "Band", "Album", 0)]);
    let (status, _) = get_response(&app, "/getLyrics?song=Song%20Three&artist=Band").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.searches_for("mut-a2"), a2_searches + 1);
    assert_eq!(stub.searches_for("mut-a1"), 0);

    // after the cooldown the account is eligible again
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let view = account_view(&app, "account-1").await;
    assert!(view["quarantinedForSecs"].is_null(), "quarantine should have lapsed: {view}");
}

// =============================================================================
// E6: LRC credit-line normalization
// =============================================================================

#[tokio::test]
async fn lrc_credits_are_trimmed_and_lyrics_preserved() {
    let (addr, stub) = spawn_stub().await;

    let mut lrc = String::from("[00:00.10]作词：某人\n[00:00.20]作曲：某某\n");
    for i in 0..32 {
        lrc.push_str(&format!("[{:02}:{:02}.00]lyric line {i}\n", i / 60, i % 60));
    }
    stub.set_lrc(&lrc);
    stub.set_krc_candidates(vec![serde_json::json!({
        "id": "7",
        "accesskey": "key-7",
        "song": "My Song",
        "singer": "The Band",
        "duration": 192_000,
        "krctype": 1,
        "score": 60,
        "product_from": "official",
        "language": "国语",
    })]);
    let (app, _ctx) = test_app(stub_config(addr));

    let (status, body) =
        get_response(&app, "/kugou/getLyrics?song=My%20Song&artist=The%20Band").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("作词"), "head credits must be trimmed");
    assert!(!body.contains("作曲"), "head credits must be trimmed");
    for i in 0..32 {
        assert!(body.contains(&format!("lyric line {i}")), "line {i} missing");
    }

    // normalized lines stay in order and carry the detected language
    let (status, body) = get_json(
        &app,
        "/kugou/getLyrics?song=My%20Song&artist=The%20Band&format=lines",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "zh");
    assert_eq!(body["provider"], "kugou");
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 32);
    assert_eq!(lines[0]["words"], "lyric line 0");
    assert_eq!(lines[31]["words"], "lyric line 31");
}
