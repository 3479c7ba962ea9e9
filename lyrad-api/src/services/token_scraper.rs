//! Bearer-token scraper
//!
//! The timed-text upstream wants a short-lived OAuth-style bearer token
//! that its own web player embeds in a script bundle. When a token source
//! URL is configured, the scraper fetches the page, extracts the first JWT
//! it finds, and caches it process-wide until the token's `exp` claim (or a
//! configured fallback TTL). Concurrent callers share one scrape through
//! the single-flight primitive; a failed scrape falls back to a still-valid
//! cached token when one exists.

use crate::cache::singleflight::SingleFlight;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use lyrad_common::{Error, Result};
use regex::Regex;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// JWTs are three base64url sections; the header always starts `eyJ`.
fn jwt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"eyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+")
            .expect("valid jwt pattern")
    })
}

/// Safety margin subtracted from the token's own expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Process-wide bearer-token cache with auto-scrape
pub struct TokenScraper {
    http: reqwest::Client,
    source_url: String,
    fallback_ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
    flights: SingleFlight<Result<String>>,
}

impl TokenScraper {
    pub fn new(source_url: String, fallback_ttl: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build token scraper http client");
        Self {
            http,
            source_url,
            fallback_ttl,
            cached: Mutex::new(None),
            flights: SingleFlight::new(),
        }
    }

    /// Current bearer token, scraping if the cache is cold or expired.
    pub async fn bearer(&self) -> Result<String> {
        if self.source_url.is_empty() {
            return Err(Error::TokenUnavailable(
                "no token source URL configured".to_string(),
            ));
        }
        if let Some(token) = self.fresh_cached() {
            return Ok(token);
        }
        match self.flights.run("bearer", || self.scrape()).await {
            Ok(flight) => flight.into_inner(),
            Err(e) => Err(e),
        }
    }

    fn fresh_cached(&self) -> Option<String> {
        let cached = self.cached.lock().expect("token cache mutex poisoned");
        cached
            .as_ref()
            .filter(|c| c.expires_at > Instant::now())
            .map(|c| c.token.clone())
    }

    async fn scrape(&self) -> Result<String> {
        match self.fetch_and_extract().await {
            Ok(token) => {
                let ttl = token_ttl(&token).unwrap_or(self.fallback_ttl);
                let mut cached = self.cached.lock().expect("token cache mutex poisoned");
                *cached = Some(CachedToken {
                    token: token.clone(),
                    expires_at: Instant::now() + ttl,
                });
                info!(ttl_secs = ttl.as_secs(), "scraped fresh bearer token");
                Ok(token)
            }
            Err(e) => {
                // a still-valid token outlives a flaky scrape
                if let Some(token) = self.fresh_cached() {
                    warn!(error = %e, "token scrape failed, serving cached token");
                    return Ok(token);
                }
                Err(e)
            }
        }
    }

    async fn fetch_and_extract(&self) -> Result<String> {
        let response = self
            .http
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| Error::TokenUnavailable(format!("token source fetch failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::TokenUnavailable(format!(
                "token source returned status {status}"
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::TokenUnavailable(format!("token source body unreadable: {e}")))?;

        jwt_pattern()
            .find(&body)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                Error::TokenUnavailable("no bearer token found in token source page".to_string())
            })
    }
}

/// TTL derived from the JWT's `exp` claim, with a safety margin.
fn token_ttl(token: &str) -> Option<Duration> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs() as i64;
    let remaining = exp - now;
    if remaining <= EXPIRY_MARGIN.as_secs() as i64 {
        debug!(exp, "scraped token is already near expiry");
        return None;
    }
    Some(Duration::from_secs(remaining as u64) - EXPIRY_MARGIN)
}
