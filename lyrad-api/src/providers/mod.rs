//! Provider adapters and registry
//!
//! Every adapter implements the same contract: given a query it searches
//! its upstream, filters candidates by the strict duration window, selects
//! the best-scoring match above the similarity threshold, fetches the
//! artifact, and returns a normalized `LyricsResult`. Adapters register
//! into a name-keyed registry at startup; reads are concurrent, writes
//! serialized.

pub mod kugou;
pub mod legacy;
pub mod ttml;

use async_trait::async_trait;
use lyrad_common::matching::{filter_by_duration, select_best};
use lyrad_common::model::{Candidate, TrackScore};
use lyrad_common::{Error, LyricsResult, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Incoming lyrics request, after HTTP parsing
#[derive(Debug, Clone, Default)]
pub struct LyricsQuery {
    pub song: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
}

impl LyricsQuery {
    /// A request must name at least a song or an artist.
    pub fn validate(&self) -> Result<()> {
        if self.song.trim().is_empty() && self.artist.trim().is_empty() {
            return Err(Error::BadRequest);
        }
        Ok(())
    }
}

/// Candidate-selection thresholds shared by every adapter
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub min_similarity_score: f64,
    pub duration_delta_ms: u64,
}

/// Uniform provider contract
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, query: &LyricsQuery) -> Result<LyricsResult>;
}

/// Name-keyed adapter registry
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn LyricsProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Arc<dyn LyricsProvider>) {
        self.providers
            .write()
            .expect("provider registry lock poisoned")
            .insert(provider.name().to_string(), provider);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn LyricsProvider>> {
        self.providers
            .read()
            .expect("provider registry lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .expect("provider registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Shared filter-then-select step: duration window first, then weighted
/// scoring with the threshold gate.
pub(crate) fn filter_and_select(
    candidates: Vec<Candidate>,
    query: &LyricsQuery,
    opts: MatchOptions,
) -> Result<(Candidate, TrackScore)> {
    if candidates.is_empty() {
        return Err(Error::UpstreamError {
            status: 404,
            body: "no search results".to_string(),
        });
    }

    let filtered = filter_by_duration(candidates, query.duration_ms, opts.duration_delta_ms);
    if filtered.is_empty() {
        return Err(Error::NoMatchInDurationWindow {
            duration_ms: query.duration_ms,
            delta_ms: opts.duration_delta_ms,
        });
    }

    let (idx, score) = select_best(
        &filtered,
        &query.song,
        &query.artist,
        &query.album,
        query.duration_ms,
    )
    .ok_or_else(|| Error::Internal("selection on non-empty candidate list failed".to_string()))?;

    if score.total_score < opts.min_similarity_score {
        return Err(Error::MatchBelowThreshold {
            score: score.total_score,
            threshold: opts.min_similarity_score,
        });
    }

    let candidate = filtered.into_iter().nth(idx).expect("index from enumerate");
    Ok((candidate, score))
}
