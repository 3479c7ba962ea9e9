//! Legacy provider adapter
//!
//! The oldest upstream in the federation. Its backend already returns
//! structured timed lines, so the adapter is the plain skeleton: search,
//! filter, select, fetch, wrap.

use crate::providers::{filter_and_select, LyricsProvider, LyricsQuery, MatchOptions};
use crate::services::legacy_client::LegacyClient;
use async_trait::async_trait;
use lyrad_common::model::{Candidate, Line};
use lyrad_common::{language, LyricsResult, Result};
use std::sync::Arc;

/// Adapter for the legacy timed-lines backend
pub struct LegacyProvider {
    client: Arc<LegacyClient>,
    opts: MatchOptions,
}

impl LegacyProvider {
    pub fn new(client: Arc<LegacyClient>, opts: MatchOptions) -> Self {
        Self { client, opts }
    }
}

#[async_trait]
impl LyricsProvider for LegacyProvider {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<LyricsResult> {
        query.validate()?;

        let tracks = self.client.search(&query.song, &query.artist).await?;
        let candidates: Vec<Candidate> = tracks
            .into_iter()
            .map(|t| Candidate {
                id: t.id,
                song_name: t.name,
                artist_name: t.artist,
                album_name: t.album,
                duration_ms: t.duration_ms,
                synced: true,
                ..Candidate::default()
            })
            .collect();

        let (best, score) = filter_and_select(candidates, query, self.opts)?;

        let (raw, legacy_lines, meta_lang) = self.client.lyrics(&best.id).await?;
        let lines: Vec<Line> = legacy_lines
            .into_iter()
            .map(|l| {
                let end = l.end_ms.max(l.start_ms);
                Line {
                    start_time_ms: l.start_ms,
                    end_time_ms: end,
                    duration_ms: end - l.start_ms,
                    words: l.words,
                    agent: l.agent,
                    syllables: Vec::new(),
                }
            })
            .collect();

        let text: String = lines.iter().map(|l| l.words.as_str()).collect::<Vec<_>>().join("\n");
        let lang = language::detect(meta_lang.as_deref(), &text);

        Ok(LyricsResult {
            raw_artifact: raw,
            lines,
            track_duration_ms: best.duration_ms,
            score: score.total_score,
            provider: self.name().to_string(),
            language: lang.to_string(),
            is_rtl: language::is_rtl(lang),
        })
    }
}
