//! Artifact parsers
//!
//! Best-effort parsers from provider-native artifacts into the normalized
//! line/syllable model. Parse failures are reported, not swallowed; the
//! caller decides whether a raw artifact without lines is still servable.

pub mod lrc;
pub mod ttml;
