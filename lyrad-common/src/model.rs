//! Normalized timed-text data model
//!
//! Every provider adapter, whatever its native artifact (TTML XML, LRC text,
//! structured line JSON), emits the same `LyricsResult` shape. Times are
//! decimal milliseconds from track start.

use serde::{Deserialize, Serialize};

/// One timed unit of word-level lyrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Syllable {
    /// Syllable text
    pub text: String,
    /// Start time in milliseconds from track start
    pub start_time: f64,
    /// End time in milliseconds from track start
    pub end_time: f64,
    /// Background vocal (TTML `role="x-bg"` spans)
    #[serde(default)]
    pub is_background: bool,
}

/// One timed lyric line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    /// Start time in milliseconds from track start
    pub start_time_ms: f64,
    /// End time in milliseconds from track start; always >= `start_time_ms`
    pub end_time_ms: f64,
    /// `end_time_ms - start_time_ms`
    pub duration_ms: f64,
    /// Full line text
    pub words: String,
    /// Vocal agent attribution (TTML `ttm:agent`), when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Word-level timing; empty for line-timed artifacts
    #[serde(default)]
    pub syllables: Vec<Syllable>,
}

/// Normalized result emitted by every provider adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsResult {
    /// Provider-native artifact, byte-exact as fetched (after normalization
    /// passes such as credit-line trimming for the LRC family)
    pub raw_artifact: String,
    /// Parsed timed lines; may be empty when parsing failed (non-fatal)
    pub lines: Vec<Line>,
    /// Duration of the matched track in milliseconds
    pub track_duration_ms: u64,
    /// Match score in [0, 1]
    pub score: f64,
    /// Provider that produced the artifact
    pub provider: String,
    /// ISO language code (detected or provider-reported)
    pub language: String,
    /// Whether `language` is written right-to-left
    pub is_rtl: bool,
}

/// Search candidate, wrapped uniformly so the scorer does not care which
/// provider produced it. Optional fields carry provider-specific extras
/// consumed only by that provider's selector.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    /// Provider-specific identifier (catalog id, krc id, hash, ...)
    pub id: String,
    pub song_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub duration_ms: u64,
    /// Provider-reported relevance score, when the search endpoint has one
    pub provider_score: Option<f64>,
    /// Candidate carries synced (timed) lyrics
    pub synced: bool,
    /// Candidate originates from an "official" source tag
    pub official: bool,
    /// Download access key (LRC family)
    pub access_key: Option<String>,
    /// Provider-reported language, when present
    pub language: Option<String>,
}

/// Weighted per-component match score for one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackScore {
    pub name_score: f64,
    pub artist_score: f64,
    pub album_score: f64,
    pub duration_score: f64,
    pub total_score: f64,
}
