//! Language detection and RTL classification
//!
//! Provider metadata wins when it names a language; otherwise a Unicode
//! range heuristic over the lyric text decides. Fallback is English.

/// Languages written right-to-left. The set is closed.
const RTL_LANGUAGES: &[&str] = &["ar", "fa", "he", "ur", "ps", "sd", "ug", "yi", "ku", "dv"];

/// Normalize a provider-reported language name to an ISO code.
///
/// Returns `None` for unknown names so callers can fall back to the text
/// heuristic instead of trusting junk metadata.
pub fn normalize_language_name(name: &str) -> Option<&'static str> {
    let lowered = name.trim().to_lowercase();
    match lowered.as_str() {
        // already ISO
        "zh" | "en" | "ja" | "ko" | "es" | "fr" | "de" => match lowered.as_str() {
            "zh" => Some("zh"),
            "en" => Some("en"),
            "ja" => Some("ja"),
            "ko" => Some("ko"),
            "es" => Some("es"),
            "fr" => Some("fr"),
            "de" => Some("de"),
            _ => None,
        },
        "chinese" | "mandarin" | "cantonese" | "中文" | "国语" | "國語" | "粤语" | "粵語" => {
            Some("zh")
        }
        "english" | "英语" => Some("en"),
        "japanese" | "日语" => Some("ja"),
        "korean" | "韩语" => Some("ko"),
        "spanish" => Some("es"),
        "french" => Some("fr"),
        "german" => Some("de"),
        _ => {
            // BCP 47 subtags like "zh-Hans" or "en-US"
            let primary = lowered.split(['-', '_']).next().unwrap_or("");
            match primary {
                "zh" => Some("zh"),
                "en" => Some("en"),
                "ja" => Some("ja"),
                "ko" => Some("ko"),
                "es" => Some("es"),
                "fr" => Some("fr"),
                "de" => Some("de"),
                "ar" => Some("ar"),
                "he" => Some("he"),
                "fa" => Some("fa"),
                _ => None,
            }
        }
    }
}

/// Detect a language code from lyric text by Unicode ranges.
///
/// Kana outranks CJK Unified (Japanese text mixes both); Hangul marks
/// Korean; bare CJK Unified marks Chinese. Everything else is English.
pub fn detect_from_text(text: &str) -> &'static str {
    let mut has_cjk = false;
    for c in text.chars() {
        match c {
            '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' => return "ja",
            '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' => return "ko",
            '\u{4E00}'..='\u{9FFF}' => has_cjk = true,
            '\u{0590}'..='\u{05FF}' => return "he",
            '\u{0600}'..='\u{06FF}' => return "ar",
            _ => {}
        }
    }
    if has_cjk {
        "zh"
    } else {
        "en"
    }
}

/// Detect the result language: metadata first, then the text heuristic.
pub fn detect(metadata_language: Option<&str>, text: &str) -> &'static str {
    if let Some(meta) = metadata_language {
        if let Some(code) = normalize_language_name(meta) {
            return code;
        }
    }
    detect_from_text(text)
}

/// Whether a language code is written right-to-left
pub fn is_rtl(code: &str) -> bool {
    RTL_LANGUAGES.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_names() {
        assert_eq!(normalize_language_name("Chinese"), Some("zh"));
        assert_eq!(normalize_language_name("国语"), Some("zh"));
        assert_eq!(normalize_language_name("粤语"), Some("zh"));
        assert_eq!(normalize_language_name("Japanese"), Some("ja"));
        assert_eq!(normalize_language_name("zh-Hans"), Some("zh"));
        assert_eq!(normalize_language_name("en-US"), Some("en"));
        assert_eq!(normalize_language_name("klingon"), None);
    }

    #[test]
    fn detects_from_unicode_ranges() {
        assert_eq!(detect_from_text("歌词测试"), "zh");
        assert_eq!(detect_from_text("歌詞のテスト"), "ja");
        assert_eq!(detect_from_text("가사 테스트"), "ko");
        assert_eq!(detect_from_text("plain english words"), "en");
        assert_eq!(detect_from_text(""), "en");
    }

    #[test]
    fn metadata_wins_over_text() {
        assert_eq!(detect(Some("Chinese"), "english text"), "zh");
        assert_eq!(detect(Some("gibberish"), "歌词"), "zh");
        assert_eq!(detect(None, "hello"), "en");
    }

    #[test]
    fn rtl_set_is_closed() {
        for code in ["ar", "fa", "he", "ur", "ps", "sd", "ug", "yi", "ku", "dv"] {
            assert!(is_rtl(code), "{code} should be RTL");
        }
        assert!(!is_rtl("en"));
        assert!(!is_rtl("zh"));
    }
}
