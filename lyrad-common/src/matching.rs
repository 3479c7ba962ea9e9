//! String similarity, weighted track scoring, and duration filtering
//!
//! The scoring pipeline every provider runs: filter candidates by a strict
//! duration window first, then score the survivors and pick the maximum.
//! The filter runs before scoring so a nearly-right song with the wrong
//! duration never wins.

use crate::model::{Candidate, TrackScore};
use std::collections::HashMap;

/// Time constant for the duration score decay, in milliseconds.
const DURATION_DECAY_MS: f64 = 20_000.0;

/// Lowercase, trim, and collapse internal whitespace.
pub fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of two strings in [0, 1].
///
/// Empty input scores 0; normalized equality scores 1; containment scores
/// `0.7 + 0.3 * (min_len / max_len)`; otherwise the multiset character
/// overlap ratio `2 * sum(min(freq_a, freq_b)) / (len_a + len_b)`.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let na = normalize(a);
    let nb = normalize(b);
    if na == nb {
        return 1.0;
    }

    let la = na.chars().count() as f64;
    let lb = nb.chars().count() as f64;
    if na.contains(&nb) || nb.contains(&na) {
        let (min_len, max_len) = if la < lb { (la, lb) } else { (lb, la) };
        return (0.7 + 0.3 * (min_len / max_len)).clamp(0.0, 1.0);
    }

    let mut freq_a: HashMap<char, u32> = HashMap::new();
    for c in na.chars() {
        *freq_a.entry(c).or_insert(0) += 1;
    }
    let mut freq_b: HashMap<char, u32> = HashMap::new();
    for c in nb.chars() {
        *freq_b.entry(c).or_insert(0) += 1;
    }

    let overlap: u32 = freq_a
        .iter()
        .map(|(c, &count)| count.min(*freq_b.get(c).unwrap_or(&0)))
        .sum();

    (2.0 * f64::from(overlap) / (la + lb)).clamp(0.0, 1.0)
}

/// Score one candidate against the requested song/artist/album/duration.
///
/// Weights are name 0.40, artist 0.30, album 0.10, duration 0.20. When no
/// duration was requested the duration weight is redistributed as
/// name +0.10, artist +0.07, album +0.03.
pub fn score_track(
    track: &Candidate,
    song: &str,
    artist: &str,
    album: &str,
    duration_ms: u64,
) -> TrackScore {
    let name_score = string_similarity(&track.song_name, song);
    let artist_score = string_similarity(&track.artist_name, artist);
    let album_score = string_similarity(&track.album_name, album);

    let (duration_score, total_score) = if duration_ms > 0 {
        let delta = (track.duration_ms as f64 - duration_ms as f64).abs();
        let duration_score = (-delta / DURATION_DECAY_MS).exp();
        let total = name_score * 0.40
            + artist_score * 0.30
            + album_score * 0.10
            + duration_score * 0.20;
        (duration_score, total)
    } else {
        let total = name_score * 0.50 + artist_score * 0.37 + album_score * 0.13;
        (0.0, total)
    };

    TrackScore {
        name_score,
        artist_score,
        album_score,
        duration_score,
        total_score: total_score.clamp(0.0, 1.0),
    }
}

/// Retain candidates within `delta_ms` of the requested duration.
///
/// A zero request duration disables the filter.
pub fn filter_by_duration(
    candidates: Vec<Candidate>,
    duration_ms: u64,
    delta_ms: u64,
) -> Vec<Candidate> {
    if duration_ms == 0 {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| c.duration_ms.abs_diff(duration_ms) <= delta_ms)
        .collect()
}

/// Pick the candidate with the maximal total score.
///
/// Returns `None` on an empty list. Threshold gating is the caller's job so
/// providers can report the losing score in their error.
pub fn select_best(
    candidates: &[Candidate],
    song: &str,
    artist: &str,
    album: &str,
    duration_ms: u64,
) -> Option<(usize, TrackScore)> {
    let mut best: Option<(usize, TrackScore)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let score = score_track(candidate, song, artist, album, duration_ms);
        match best {
            Some((_, b)) if b.total_score >= score.total_score => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}
