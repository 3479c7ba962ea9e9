//! Request fingerprints
//!
//! A fingerprint is the stable cache key derived from the normalized
//! request tuple. Same inputs always produce the same fingerprint; TTL and
//! freshness never leak into it.

use lyrad_common::matching::normalize;

/// Build the fingerprint for `(provider, song, artist, album, duration_ms)`.
///
/// Each text component is lowercased, trimmed, and whitespace-collapsed.
/// The result is opaque to callers; nothing outside the cache plane should
/// parse it.
pub fn fingerprint(
    provider: &str,
    song: &str,
    artist: &str,
    album: &str,
    duration_ms: u64,
) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        normalize(provider),
        normalize(song),
        normalize(artist),
        normalize(album),
        duration_ms
    )
}
