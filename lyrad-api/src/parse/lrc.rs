//! LRC artifact normalization and parsing
//!
//! Normalization removes provider credit lines (`[mm:ss.xx]作词：...`
//! and friends) from the head and tail of the artifact, scanning at most 30
//! lines from each end, and replaces the instrumental placeholder with a
//! playable marker line. Parsing turns `[mm:ss.xx]text` lines into the
//! normalized line model; LRC has no word timing, so syllable lists stay
//! empty.

use lyrad_common::model::Line;
use regex::Regex;
use std::sync::OnceLock;

/// Lines scanned from each end when trimming credits.
const CREDIT_SCAN_WINDOW: usize = 30;

/// Placeholder the LRC family uses for instrumental tracks.
const INSTRUMENTAL_PLACEHOLDER: &str = "纯音乐，请欣赏";
const INSTRUMENTAL_LINE: &str = "[00:00.00][Instrumental Only]";

fn credit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // timestamped line whose text is "<role>：<name>" with a full-width colon
    PATTERN.get_or_init(|| {
        Regex::new(r"\[\d{2}:\d{2}[.:]\d{2,3}\].+：.+").expect("valid credit pattern")
    })
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[(\d{1,3}):(\d{2})[.:](\d{2,3})\]").expect("valid timestamp pattern")
    })
}

fn metadata_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[(ar|ti|al|by|re|ve|offset):").expect("valid metadata pattern")
    })
}

/// Strip credit lines and replace the instrumental placeholder.
pub fn normalize_lrc(raw: &str) -> String {
    let mut lines: Vec<String> = raw
        .lines()
        .map(|line| {
            if line.contains(INSTRUMENTAL_PLACEHOLDER) {
                INSTRUMENTAL_LINE.to_string()
            } else {
                line.to_string()
            }
        })
        .collect();

    // head window
    let head = lines.len().min(CREDIT_SCAN_WINDOW);
    let mut keep: Vec<bool> = vec![true; lines.len()];
    for (idx, line) in lines.iter().take(head).enumerate() {
        if credit_pattern().is_match(line) {
            keep[idx] = false;
        }
    }
    // tail window
    let tail_start = lines.len().saturating_sub(CREDIT_SCAN_WINDOW);
    for (idx, line) in lines.iter().enumerate().skip(tail_start) {
        if credit_pattern().is_match(line) {
            keep[idx] = false;
        }
    }

    let mut kept = keep.iter();
    lines.retain(|_| *kept.next().unwrap());
    lines.join("\n")
}

/// Parse normalized LRC text into timed lines.
///
/// A line may carry several leading timestamps; each produces its own
/// entry. Metadata tags are skipped. End times back-fill from the next
/// line's start; the final line ends where it starts.
pub fn parse_lrc(text: &str) -> Vec<Line> {
    let mut timed: Vec<(f64, String)> = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || metadata_pattern().is_match(line) {
            continue;
        }

        let mut rest = line;
        let mut stamps: Vec<f64> = Vec::new();
        while let Some(caps) = timestamp_pattern().captures(rest) {
            let minutes: f64 = caps[1].parse().unwrap_or(0.0);
            let seconds: f64 = caps[2].parse().unwrap_or(0.0);
            let frac = &caps[3];
            let frac_ms: f64 = match frac.len() {
                2 => frac.parse::<f64>().unwrap_or(0.0) * 10.0,
                _ => frac.parse::<f64>().unwrap_or(0.0),
            };
            stamps.push((minutes * 60.0 + seconds) * 1000.0 + frac_ms);
            rest = &rest[caps[0].len()..];
        }
        if stamps.is_empty() {
            continue;
        }
        let words = rest.trim().to_string();
        for stamp in stamps {
            timed.push((stamp, words.clone()));
        }
    }

    timed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines = Vec::with_capacity(timed.len());
    for idx in 0..timed.len() {
        let (start, ref words) = timed[idx];
        let end = timed.get(idx + 1).map_or(start, |next| next.0.max(start));
        lines.push(Line {
            start_time_ms: start,
            end_time_ms: end,
            duration_ms: end - start,
            words: words.clone(),
            agent: None,
            syllables: Vec::new(),
        });
    }
    lines
}
