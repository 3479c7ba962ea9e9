//! Fingerprint cache for positive and negative lyrics results
//!
//! A concurrent map from fingerprint to entry, with per-entry TTLs,
//! optional transparent gzip compression, and atomic hit/miss accounting.
//! Expired entries linger as `Stale` until the background reaper removes
//! them; the orchestrator decides whether a stale value is still servable.

pub mod fingerprint;
pub mod singleflight;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Payloads below this size are stored uncompressed even when compression
/// is enabled; gzip overhead dominates under ~1 KiB.
const MIN_COMPRESS_BYTES: usize = 1024;

/// Cache construction options
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// `FF_CACHE_COMPRESSION`: gzip payloads above the size threshold
    pub compression: bool,
}

/// Freshness state returned alongside lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Miss,
    FreshPositive,
    FreshNegative,
    Stale,
}

/// Decompressed positive entry view handed to callers
#[derive(Debug, Clone)]
pub struct CachedLyrics {
    pub payload: Vec<u8>,
    pub score: f64,
    pub track_duration_ms: u64,
    pub language: String,
    pub is_rtl: bool,
    pub provider: String,
}

/// Lookup outcome; `Stale` only ever wraps positives (an expired negative
/// carries nothing worth serving and reads as `Miss`).
#[derive(Debug, Clone)]
pub enum Lookup {
    Miss,
    FreshPositive(CachedLyrics),
    FreshNegative { reason: String },
    Stale(CachedLyrics),
}

#[derive(Debug, Clone)]
enum EntryKind {
    Positive {
        payload: Vec<u8>,
        score: f64,
        track_duration_ms: u64,
        language: String,
        is_rtl: bool,
    },
    Negative {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
struct CacheEntry {
    kind: EntryKind,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    provider: String,
    compressed: bool,
}

/// One entry in the `/cache` dump
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpEntry {
    pub provider: String,
    pub kind: &'static str,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub compressed: bool,
    pub size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Aggregate counters reported by `/cache`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub number_of_keys: usize,
    pub size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub negative_hits: u64,
    pub stale_hits: u64,
    pub hit_rate_percent: f64,
}

/// Concurrent fingerprint -> entry cache with hit/miss accounting.
///
/// The cache is the sole owner and mutator of its entries. Counter policy
/// lives in the orchestrator: lookups never count by themselves, callers
/// record the outcome they acted on via the `note_*` methods.
pub struct LyricsCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    options: CacheOptions,
    hits: AtomicU64,
    misses: AtomicU64,
    negative_hits: AtomicU64,
    stale_hits: AtomicU64,
}

impl LyricsCache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            options,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            negative_hits: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
        }
    }

    /// Cheap freshness probe for rate-limit classification. Never touches
    /// counters and never decompresses.
    pub async fn peek_state(&self, fingerprint: &str) -> CacheState {
        let entries = self.entries.read().await;
        match entries.get(fingerprint) {
            None => CacheState::Miss,
            Some(entry) if entry.expires_at > Utc::now() => match entry.kind {
                EntryKind::Positive { .. } => CacheState::FreshPositive,
                EntryKind::Negative { .. } => CacheState::FreshNegative,
            },
            Some(entry) => match entry.kind {
                EntryKind::Positive { .. } => CacheState::Stale,
                EntryKind::Negative { .. } => CacheState::Miss,
            },
        }
    }

    /// Full lookup. Positive payloads come back decompressed; an entry that
    /// fails decompression is dropped and reported as a miss.
    pub async fn get(&self, fingerprint: &str) -> Lookup {
        let entry = {
            let entries = self.entries.read().await;
            match entries.get(fingerprint) {
                Some(entry) => entry.clone(),
                None => return Lookup::Miss,
            }
        };

        let fresh = entry.expires_at > Utc::now();
        match entry.kind {
            EntryKind::Negative { reason, .. } => {
                if fresh {
                    Lookup::FreshNegative { reason }
                } else {
                    Lookup::Miss
                }
            }
            EntryKind::Positive {
                payload,
                score,
                track_duration_ms,
                language,
                is_rtl,
            } => {
                let payload = if entry.compressed {
                    match decompress(&payload) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!(fingerprint, error = %e, "dropping undecompressable cache entry");
                            self.invalidate(fingerprint).await;
                            return Lookup::Miss;
                        }
                    }
                } else {
                    payload
                };
                let cached = CachedLyrics {
                    payload,
                    score,
                    track_duration_ms,
                    language,
                    is_rtl,
                    provider: entry.provider,
                };
                if fresh {
                    Lookup::FreshPositive(cached)
                } else {
                    Lookup::Stale(cached)
                }
            }
        }
    }

    /// Store a positive result. Compresses when the feature flag is on and
    /// the payload clears the minimum size threshold.
    #[allow(clippy::too_many_arguments)]
    pub async fn put_positive(
        &self,
        fingerprint: &str,
        payload: &[u8],
        score: f64,
        track_duration_ms: u64,
        language: &str,
        is_rtl: bool,
        provider: &str,
        ttl: Duration,
    ) {
        let now = Utc::now();
        let compress = self.options.compression && payload.len() >= MIN_COMPRESS_BYTES;
        let (stored, compressed) = if compress {
            match compress_bytes(payload) {
                Ok(bytes) => (bytes, true),
                Err(e) => {
                    warn!(fingerprint, error = %e, "compression failed, storing raw");
                    (payload.to_vec(), false)
                }
            }
        } else {
            (payload.to_vec(), false)
        };

        let entry = CacheEntry {
            kind: EntryKind::Positive {
                payload: stored,
                score,
                track_duration_ms,
                language: language.to_string(),
                is_rtl,
            },
            inserted_at: now,
            expires_at: now + chrono_ttl(ttl),
            provider: provider.to_string(),
            compressed,
        };
        self.entries.write().await.insert(fingerprint.to_string(), entry);
        debug!(fingerprint, provider, compressed, "cached positive entry");
    }

    /// Store a negative result with its reason.
    pub async fn put_negative(
        &self,
        fingerprint: &str,
        reason: &str,
        provider: &str,
        ttl: Duration,
    ) {
        let now = Utc::now();
        let entry = CacheEntry {
            kind: EntryKind::Negative {
                reason: reason.to_string(),
                timestamp: now,
            },
            inserted_at: now,
            expires_at: now + chrono_ttl(ttl),
            provider: provider.to_string(),
            compressed: false,
        };
        self.entries.write().await.insert(fingerprint.to_string(), entry);
        debug!(fingerprint, provider, reason, "cached negative entry");
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn invalidate(&self, fingerprint: &str) -> bool {
        self.entries.write().await.remove(fingerprint).is_some()
    }

    /// Snapshot the whole cache for `/cache`.
    pub async fn dump(&self) -> (HashMap<String, DumpEntry>, CacheStats) {
        let entries = self.entries.read().await;
        let mut map = HashMap::with_capacity(entries.len());
        let mut size_bytes = 0usize;
        for (key, entry) in entries.iter() {
            let (kind, size, score, language, reason, recorded_at) = match &entry.kind {
                EntryKind::Positive {
                    payload,
                    score,
                    language,
                    ..
                } => (
                    "positive",
                    payload.len(),
                    Some(*score),
                    Some(language.clone()),
                    None,
                    entry.inserted_at,
                ),
                EntryKind::Negative { reason, timestamp } => (
                    "negative",
                    reason.len(),
                    None,
                    None,
                    Some(reason.clone()),
                    *timestamp,
                ),
            };
            size_bytes += size;
            map.insert(
                key.clone(),
                DumpEntry {
                    provider: entry.provider.clone(),
                    kind,
                    inserted_at: recorded_at,
                    expires_at: entry.expires_at,
                    compressed: entry.compressed,
                    size_bytes: size,
                    score,
                    language,
                    reason,
                },
            );
        }

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let negative_hits = self.negative_hits.load(Ordering::Relaxed);
        let stale_hits = self.stale_hits.load(Ordering::Relaxed);
        let served = hits + negative_hits + stale_hits;
        let total = served + misses;
        let hit_rate_percent = if total == 0 {
            0.0
        } else {
            served as f64 * 100.0 / total as f64
        };

        let stats = CacheStats {
            number_of_keys: map.len(),
            size_bytes,
            hits,
            misses,
            negative_hits,
            stale_hits,
            hit_rate_percent,
        };
        (map, stats)
    }

    /// Remove every entry with `expires_at <= now`. Returns how many went.
    pub async fn reap(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn note_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.negative_hits.load(Ordering::Relaxed),
            self.stale_hits.load(Ordering::Relaxed),
        )
    }
}

fn chrono_ttl(ttl: Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(365))
}

fn compress_bytes(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}

fn decompress(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(payload);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Start the background reaper. Wakes every `interval`, drops expired
/// entries, stops when `shutdown` fires.
pub fn spawn_reaper(
    cache: std::sync::Arc<LyricsCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick fires immediately; skip it
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("cache reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.reap().await;
                    if removed > 0 {
                        debug!(removed, "reaped expired cache entries");
                    }
                }
            }
        }
    })
}
