//! LRC-family (KuGou) provider adapter
//!
//! Candidate selection here layers provider-specific bonuses on top of the
//! shared duration filter: synced artifacts, exact or containing name and
//! artist matches, duration proximity, and an official-origin tag all add
//! raw points. Raw scores normalize against the documented maximum for the
//! endpoint (145 for the candidate search, 78 for the song-level search)
//! and the usual similarity threshold gates acceptance.

use crate::parse::lrc::{normalize_lrc, parse_lrc};
use crate::providers::{LyricsProvider, LyricsQuery, MatchOptions};
use crate::services::kugou_client::{KrcCandidate, KugouClient, SongInfo};
use async_trait::async_trait;
use lyrad_common::matching::normalize;
use lyrad_common::{language, Error, LyricsResult, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum reachable raw score for the candidate search endpoint
const KRC_SEARCH_MAX_SCORE: f64 = 145.0;
/// Maximum reachable raw score for the song-level search endpoint
const SONG_SEARCH_MAX_SCORE: f64 = 78.0;
/// Provider-reported relevance is capped before entering the raw score
const PROVIDER_SCORE_CAP: f64 = 60.0;
/// Raw points assumed for synced content on the song-level endpoint, which
/// does not report a lyric type
const SONG_SEARCH_SYNC_ASSUMPTION: f64 = 13.0;

/// Adapter for the LRC family
pub struct KugouProvider {
    client: Arc<KugouClient>,
    opts: MatchOptions,
}

impl KugouProvider {
    pub fn new(client: Arc<KugouClient>, opts: MatchOptions) -> Self {
        Self { client, opts }
    }

    /// Raw bonus ladder for one krc candidate, normalized to [0, 1].
    fn candidate_score(candidate: &KrcCandidate, query: &LyricsQuery) -> f64 {
        let mut raw = candidate.score.clamp(0.0, PROVIDER_SCORE_CAP);
        if candidate.krctype != 0 {
            raw += 20.0;
        }
        raw += name_bonus(&candidate.song, &query.song, 20.0, 10.0);
        raw += name_bonus(&candidate.singer, &query.artist, 20.0, 10.0);
        raw += duration_bonus(candidate.duration, query.duration_ms);
        if candidate.product_from.to_lowercase().contains("official") {
            raw += 5.0;
        }
        (raw / KRC_SEARCH_MAX_SCORE).clamp(0.0, 1.0)
    }

    /// Raw bonus ladder for one song-level hit, normalized to [0, 1].
    fn song_score(info: &SongInfo, query: &LyricsQuery) -> f64 {
        let mut raw = SONG_SEARCH_SYNC_ASSUMPTION;
        raw += name_bonus(&info.songname, &query.song, 20.0, 10.0);
        raw += name_bonus(&info.singername, &query.artist, 20.0, 10.0);
        raw += duration_bonus(info.duration * 1000, query.duration_ms);
        (raw / SONG_SEARCH_MAX_SCORE).clamp(0.0, 1.0)
    }

    /// Duration-filter a candidate list; distinguishes "nothing came back"
    /// from "everything fell outside the window".
    fn filter_duration(
        &self,
        candidates: Vec<KrcCandidate>,
        query: &LyricsQuery,
    ) -> Result<Vec<KrcCandidate>> {
        if candidates.is_empty() {
            return Err(Error::UpstreamError {
                status: 404,
                body: "no lyrics candidates".to_string(),
            });
        }
        if query.duration_ms == 0 {
            return Ok(candidates);
        }
        let filtered: Vec<KrcCandidate> = candidates
            .into_iter()
            .filter(|c| c.duration.abs_diff(query.duration_ms) <= self.opts.duration_delta_ms)
            .collect();
        if filtered.is_empty() {
            return Err(Error::NoMatchInDurationWindow {
                duration_ms: query.duration_ms,
                delta_ms: self.opts.duration_delta_ms,
            });
        }
        Ok(filtered)
    }

    /// Keyword search, falling back to the song-level endpoint when the
    /// candidate search comes up empty.
    async fn collect_candidates(&self, query: &LyricsQuery) -> Result<Vec<KrcCandidate>> {
        let keyword = if query.artist.is_empty() {
            query.song.clone()
        } else {
            format!("{} - {}", query.artist, query.song)
        };
        let candidates = self
            .client
            .search_candidates(&keyword, query.duration_ms)
            .await?;
        if !candidates.is_empty() {
            return Ok(candidates);
        }

        debug!(keyword = %keyword, "candidate search empty, trying song-level search");
        let songs = self
            .client
            .search_songs(format!("{} {}", query.song, query.artist).trim())
            .await?;
        let best_song = songs
            .iter()
            .max_by(|a, b| {
                Self::song_score(a, query)
                    .partial_cmp(&Self::song_score(b, query))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();
        match best_song {
            Some(song) if !song.hash.is_empty() => {
                self.client.search_candidates_by_hash(&song.hash).await
            }
            _ => Ok(Vec::new()),
        }
    }
}

fn name_bonus(candidate: &str, requested: &str, exact: f64, contains: f64) -> f64 {
    if requested.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let c = normalize(candidate);
    let r = normalize(requested);
    if c == r {
        exact
    } else if c.contains(&r) || r.contains(&c) {
        contains
    } else {
        0.0
    }
}

fn duration_bonus(candidate_ms: u64, requested_ms: u64) -> f64 {
    if requested_ms == 0 {
        return 0.0;
    }
    let delta = candidate_ms.abs_diff(requested_ms);
    if delta < 3_000 {
        20.0
    } else if delta < 5_000 {
        10.0
    } else if delta < 10_000 {
        5.0
    } else {
        0.0
    }
}

#[async_trait]
impl LyricsProvider for KugouProvider {
    fn name(&self) -> &'static str {
        "kugou"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<LyricsResult> {
        query.validate()?;

        let candidates = self.collect_candidates(query).await?;
        let filtered = self.filter_duration(candidates, query)?;

        let (best, score) = filtered
            .into_iter()
            .map(|c| {
                let score = Self::candidate_score(&c, query);
                (c, score)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("filter_duration never returns empty");

        if score < self.opts.min_similarity_score {
            return Err(Error::MatchBelowThreshold {
                score,
                threshold: self.opts.min_similarity_score,
            });
        }

        let raw = self.client.download_lrc(&best.id, &best.accesskey).await?;
        let artifact = normalize_lrc(&raw);
        let lines = parse_lrc(&artifact);
        if lines.is_empty() {
            warn!(song = %best.song, "downloaded LRC parsed to zero lines");
        }

        let text: String = lines.iter().map(|l| l.words.as_str()).collect::<Vec<_>>().join("\n");
        let meta_lang = (!best.language.is_empty()).then_some(best.language.as_str());
        let lang = language::detect(meta_lang, &text);

        Ok(LyricsResult {
            raw_artifact: artifact,
            lines,
            track_duration_ms: best.duration,
            score,
            provider: self.name().to_string(),
            language: lang.to_string(),
            is_rtl: language::is_rtl(lang),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn krc(song: &str, singer: &str, duration: u64, score: f64, krctype: i64) -> KrcCandidate {
        KrcCandidate {
            id: "1".to_string(),
            accesskey: "k".to_string(),
            song: song.to_string(),
            singer: singer.to_string(),
            duration,
            krctype,
            score,
            product_from: String::new(),
            language: String::new(),
        }
    }

    fn query(song: &str, artist: &str, duration_ms: u64) -> LyricsQuery {
        LyricsQuery {
            song: song.to_string(),
            artist: artist.to_string(),
            album: String::new(),
            duration_ms,
        }
    }

    #[test]
    fn perfect_candidate_reaches_full_score() {
        let c = {
            let mut c = krc("晴天", "周杰伦", 269_000, 60.0, 1);
            c.product_from = "official".to_string();
            c
        };
        let q = query("晴天", "周杰伦", 269_500);
        // 60 + 20 sync + 20 name + 20 artist + 20 duration + 5 official = 145
        assert!((KugouProvider::candidate_score(&c, &q) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duration_bonus_tiers() {
        assert_eq!(duration_bonus(100_000, 102_000), 20.0);
        assert_eq!(duration_bonus(100_000, 104_000), 10.0);
        assert_eq!(duration_bonus(100_000, 109_000), 5.0);
        assert_eq!(duration_bonus(100_000, 120_000), 0.0);
        assert_eq!(duration_bonus(100_000, 0), 0.0);
    }

    #[test]
    fn name_bonus_exact_beats_contains() {
        assert_eq!(name_bonus("Shape of You", "shape of you", 20.0, 10.0), 20.0);
        assert_eq!(name_bonus("Shape of You (Remix)", "Shape of You", 20.0, 10.0), 10.0);
        assert_eq!(name_bonus("Other Song", "Shape of You", 20.0, 10.0), 0.0);
        assert_eq!(name_bonus("Anything", "", 20.0, 10.0), 0.0);
    }

    #[test]
    fn unsynced_weak_candidate_falls_below_threshold() {
        let c = krc("完全不同的歌", "别人", 500_000, 5.0, 0);
        let q = query("晴天", "周杰伦", 0);
        assert!(KugouProvider::candidate_score(&c, &q) < 0.6);
    }

    #[test]
    fn song_level_score_is_bounded() {
        let info = SongInfo {
            hash: "h".to_string(),
            songname: "晴天".to_string(),
            singername: "周杰伦".to_string(),
            duration: 269,
        };
        let q = query("晴天", "周杰伦", 269_500);
        // 13 + 20 + 20 + 20 = 73 of 78
        let s = KugouProvider::song_score(&info, &q);
        assert!(s > 0.9 && s <= 1.0, "got {s}");
    }
}
