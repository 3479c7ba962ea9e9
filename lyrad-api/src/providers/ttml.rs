//! Timed-text (TTML) provider adapter
//!
//! Searches the catalog, picks the best candidate, fetches the syllable
//! TTML artifact through the multi-account client, and parses it. Parse
//! failure is logged and non-fatal; the raw artifact still flows out.

use crate::providers::{filter_and_select, LyricsProvider, LyricsQuery, MatchOptions};
use crate::services::timed_text_client::TimedTextClient;
use async_trait::async_trait;
use lyrad_common::model::Candidate;
use lyrad_common::{language, Error, LyricsResult, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    #[serde(default)]
    songs: SongSection,
}

#[derive(Debug, Default, Deserialize)]
struct SongSection {
    #[serde(default)]
    data: Vec<SongData>,
}

#[derive(Debug, Deserialize)]
struct SongData {
    id: String,
    #[serde(default)]
    attributes: SongAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct SongAttributes {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    album_name: String,
    #[serde(default)]
    duration_in_millis: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    isrc: String,
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    #[serde(default)]
    data: Vec<LyricsData>,
}

#[derive(Debug, Deserialize)]
struct LyricsData {
    #[serde(default)]
    attributes: LyricsAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct LyricsAttributes {
    #[serde(default)]
    ttml: String,
    #[serde(default)]
    ttml_localizations: Option<serde_json::Value>,
}

/// Adapter for the timed-text catalog
pub struct TtmlProvider {
    client: Arc<TimedTextClient>,
    base_url: String,
    search_path: String,
    lyrics_path: String,
    opts: MatchOptions,
}

impl TtmlProvider {
    pub fn new(
        client: Arc<TimedTextClient>,
        base_url: String,
        search_path: String,
        lyrics_path: String,
        opts: MatchOptions,
    ) -> Self {
        Self { client, base_url, search_path, lyrics_path, opts }
    }

    async fn search(&self, query: &LyricsQuery) -> Result<Vec<Candidate>> {
        let term = format!("{} {}", query.song, query.artist);
        let url = format!(
            "{}{}?term={}&types=songs&limit=25",
            self.base_url,
            self.search_path,
            urlencoding::encode(term.trim())
        );
        let body = self.client.get(&url).await?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("search response: {e}")))?;

        Ok(parsed
            .results
            .songs
            .data
            .into_iter()
            .map(|song| Candidate {
                id: song.id,
                song_name: song.attributes.name,
                artist_name: song.attributes.artist_name,
                album_name: song.attributes.album_name,
                duration_ms: song.attributes.duration_in_millis,
                synced: true,
                ..Candidate::default()
            })
            .collect())
    }

    async fn fetch_artifact(&self, id: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, self.lyrics_path.replace("{id}", id));
        let body = self.client.get(&url).await?;
        let parsed: LyricsResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ProviderParseError(format!("lyrics response: {e}")))?;

        let ttml = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.attributes.ttml)
            .unwrap_or_default();
        if ttml.is_empty() {
            return Err(Error::UpstreamError {
                status: 404,
                body: "no syllable lyrics for this song".to_string(),
            });
        }
        Ok(ttml)
    }
}

#[async_trait]
impl LyricsProvider for TtmlProvider {
    fn name(&self) -> &'static str {
        "ttml"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<LyricsResult> {
        query.validate()?;

        let candidates = self.search(query).await?;
        debug!(candidates = candidates.len(), "timed-text search results");
        let (best, score) = filter_and_select(candidates, query, self.opts)?;

        let artifact = self.fetch_artifact(&best.id).await?;

        let (lines, meta_lang) = match crate::parse::ttml::parse_ttml(&artifact) {
            Ok(doc) => (doc.lines, doc.language),
            Err(e) => {
                warn!(song = %best.song_name, error = %e, "ttml parse failed, serving raw artifact");
                (Vec::new(), None)
            }
        };

        let text: String = lines.iter().map(|l| l.words.as_str()).collect::<Vec<_>>().join("\n");
        let lang = language::detect(meta_lang.as_deref(), &text);

        Ok(LyricsResult {
            raw_artifact: artifact,
            lines,
            track_duration_ms: best.duration_ms,
            score: score.total_score,
            provider: self.name().to_string(),
            language: lang.to_string(),
            is_rtl: language::is_rtl(lang),
        })
    }
}
