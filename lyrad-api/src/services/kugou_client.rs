//! LRC-family (KuGou) upstream client
//!
//! Three JSON endpoints: the krc candidate search, the song-level search
//! used as a fallback when the keyword search comes up empty, and the
//! download endpoint whose payload is base64-encoded LRC text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lyrad_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One candidate from the krc search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct KrcCandidate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub accesskey: String,
    #[serde(default)]
    pub song: String,
    #[serde(default)]
    pub singer: String,
    /// Track duration in milliseconds
    #[serde(default)]
    pub duration: u64,
    /// Non-zero marks a synced (timed) candidate
    #[serde(default)]
    pub krctype: i64,
    /// Provider-reported relevance score
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub product_from: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct KrcSearchResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    candidates: Vec<KrcCandidate>,
}

/// One hit from the song-level search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SongInfo {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub songname: String,
    #[serde(default)]
    pub singername: String,
    /// Track duration in seconds
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Deserialize)]
struct SongSearchResponse {
    #[serde(default)]
    data: SongSearchData,
}

#[derive(Debug, Default, Deserialize)]
struct SongSearchData {
    #[serde(default)]
    info: Vec<SongInfo>,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    #[serde(default)]
    content: String,
}

/// Client for the LRC-family endpoints
pub struct KugouClient {
    http: reqwest::Client,
    base_url: String,
    song_search_url: String,
}

impl KugouClient {
    pub fn new(base_url: String, song_search_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build kugou http client");
        Self { http, base_url, song_search_url }
    }

    /// Keyword search for krc candidates. `duration_ms == 0` omits the
    /// duration hint.
    pub async fn search_candidates(
        &self,
        keyword: &str,
        duration_ms: u64,
    ) -> Result<Vec<KrcCandidate>> {
        let mut request = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("ver", "1"), ("man", "yes"), ("client", "pc"), ("keyword", keyword)]);
        if duration_ms > 0 {
            request = request.query(&[("duration", duration_ms.to_string())]);
        }
        let body = fetch_text(request).await?;
        let parsed: KrcSearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("krc search response: {e}")))?;
        if parsed.status != 200 {
            return Err(Error::UpstreamError {
                status: 200,
                body: format!("krc search status field {}", parsed.status),
            });
        }
        debug!(keyword, candidates = parsed.candidates.len(), "krc search");
        Ok(parsed.candidates)
    }

    /// Krc candidates for one specific song hash
    pub async fn search_candidates_by_hash(&self, hash: &str) -> Result<Vec<KrcCandidate>> {
        let request = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("ver", "1"), ("man", "yes"), ("client", "pc"), ("hash", hash)]);
        let body = fetch_text(request).await?;
        let parsed: KrcSearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("krc hash search response: {e}")))?;
        Ok(parsed.candidates)
    }

    /// Song-level search fallback
    pub async fn search_songs(&self, keyword: &str) -> Result<Vec<SongInfo>> {
        let request = self
            .http
            .get(&self.song_search_url)
            .query(&[("format", "json"), ("page", "1"), ("pagesize", "20"), ("keyword", keyword)]);
        let body = fetch_text(request).await?;
        let parsed: SongSearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("song search response: {e}")))?;
        debug!(keyword, hits = parsed.data.info.len(), "song-level search");
        Ok(parsed.data.info)
    }

    /// Download and decode the LRC artifact for one candidate
    pub async fn download_lrc(&self, id: &str, access_key: &str) -> Result<String> {
        let request = self.http.get(format!("{}/download", self.base_url)).query(&[
            ("ver", "1"),
            ("client", "pc"),
            ("fmt", "lrc"),
            ("charset", "utf8"),
            ("id", id),
            ("accesskey", access_key),
        ]);
        let body = fetch_text(request).await?;
        let parsed: DownloadResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("download response: {e}")))?;
        if parsed.content.is_empty() {
            return Err(Error::UpstreamError {
                status: 404,
                body: "empty lyrics download".to_string(),
            });
        }
        let bytes = STANDARD
            .decode(parsed.content.trim())
            .map_err(|e| Error::ProviderParseError(format!("lyrics base64: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| Error::ProviderParseError(format!("lyrics not utf-8: {e}")))
    }
}

async fn fetch_text(request: reqwest::RequestBuilder) -> Result<String> {
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
