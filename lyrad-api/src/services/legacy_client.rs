//! Legacy provider client
//!
//! The legacy backend sits behind a token-authenticated JSON API that
//! yields structured timed lines directly; its OAuth/scrape plumbing lives
//! outside this service. Unconfigured deployments simply never resolve the
//! `legacy` provider to a working backend.

use lyrad_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// One track from the legacy search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyTrack {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct LegacySearchResponse {
    #[serde(default)]
    tracks: Vec<LegacyTrack>,
}

/// One structured timed line from the legacy lyrics endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyLine {
    #[serde(default)]
    pub start_ms: f64,
    #[serde(default)]
    pub end_ms: f64,
    #[serde(default)]
    pub words: String,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyLyricsResponse {
    #[serde(default)]
    lines: Vec<LegacyLine>,
    #[serde(default)]
    language: Option<String>,
}

/// Client for the legacy timed-lines backend
pub struct LegacyClient {
    http: reqwest::Client,
    base_url: String,
    search_path: String,
    lyrics_path: String,
    api_token: String,
}

impl LegacyClient {
    pub fn new(base_url: String, search_path: String, lyrics_path: String, api_token: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build legacy http client");
        Self { http, base_url, search_path, lyrics_path, api_token }
    }

    pub fn configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub async fn search(&self, song: &str, artist: &str) -> Result<Vec<LegacyTrack>> {
        let body = self
            .get(&self.search_path, &[("song", song), ("artist", artist)])
            .await?;
        let parsed: LegacySearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("legacy search response: {e}")))?;
        Ok(parsed.tracks)
    }

    /// Fetch timed lines and the reported language for one track. Returns
    /// the raw body too, so the adapter can serve the native artifact.
    pub async fn lyrics(&self, id: &str) -> Result<(String, Vec<LegacyLine>, Option<String>)> {
        let body = self.get(&self.lyrics_path, &[("id", id)]).await?;
        let parsed: LegacyLyricsResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("legacy lyrics response: {e}")))?;
        Ok((body, parsed.lines, parsed.language))
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        if !self.configured() {
            return Err(Error::UpstreamError {
                status: 0,
                body: "legacy provider is not configured".to_string(),
            });
        }
        let mut request = self.http.get(format!("{}{}", self.base_url, path)).query(query);
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::UpstreamError { status: 0, body: e.to_string() })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::UpstreamError { status: 0, body: e.to_string() })?;
        if status != 200 {
            return Err(Error::UpstreamError { status, body });
        }
        Ok(body)
    }
}
