//! TTML artifact parsing
//!
//! Walks the `<tt><body><div><p>` structure: each `<p>` is a line with
//! optional `ttm:agent` attribution, each timed `<span>` inside is a
//! syllable, and spans under a `role="x-bg"` span are background vocals.
//! Clock values come as `H:MM:SS.mmm`, `MM:SS.mmm`, or bare seconds.

use lyrad_common::model::{Line, Syllable};
use lyrad_common::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parsed TTML document
#[derive(Debug, Default)]
pub struct TtmlDocument {
    pub lines: Vec<Line>,
    /// `xml:lang` from the root element, when present
    pub language: Option<String>,
    /// `timing` attribute from the root element (`word`, `line`, `none`)
    pub timing: Option<String>,
}

struct SpanFrame {
    begin: Option<f64>,
    end: Option<f64>,
    background: bool,
    text: String,
}

/// Parse a TTML artifact into timed lines.
pub fn parse_ttml(xml: &str) -> Result<TtmlDocument> {
    let mut reader = Reader::from_str(xml);
    let mut doc = TtmlDocument::default();

    let mut current_line: Option<Line> = None;
    let mut span_stack: Vec<SpanFrame> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::ProviderParseError(format!("ttml: {e}")))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"tt" => {
                    doc.language = attr(&e, "xml:lang");
                    doc.timing = attr(&e, "timing").or_else(|| attr(&e, "itunes:timing"));
                }
                b"p" => {
                    let begin = attr(&e, "begin").and_then(|v| parse_clock(&v));
                    let end = attr(&e, "end").and_then(|v| parse_clock(&v));
                    current_line = Some(Line {
                        start_time_ms: begin.unwrap_or(0.0),
                        end_time_ms: end.unwrap_or(0.0),
                        duration_ms: 0.0,
                        words: String::new(),
                        agent: attr(&e, "ttm:agent"),
                        syllables: Vec::new(),
                    });
                }
                b"span" if current_line.is_some() => {
                    let inherited_bg = span_stack.iter().any(|f| f.background);
                    let role = attr(&e, "role").or_else(|| attr(&e, "ttm:role"));
                    span_stack.push(SpanFrame {
                        begin: attr(&e, "begin").and_then(|v| parse_clock(&v)),
                        end: attr(&e, "end").and_then(|v| parse_clock(&v)),
                        background: inherited_bg || role.as_deref() == Some("x-bg"),
                        text: String::new(),
                    });
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"p" => {
                    if let Some(mut line) = current_line.take() {
                        line.words = line.words.trim().to_string();
                        if line.end_time_ms < line.start_time_ms {
                            line.end_time_ms = line.start_time_ms;
                        }
                        line.duration_ms = line.end_time_ms - line.start_time_ms;
                        doc.lines.push(line);
                    }
                }
                b"span" => {
                    if let Some(frame) = span_stack.pop() {
                        let line = match current_line.as_mut() {
                            Some(line) => line,
                            None => continue,
                        };
                        match (frame.begin, frame.end) {
                            (Some(begin), Some(end)) if !frame.text.is_empty() => {
                                if !frame.background {
                                    push_word(&mut line.words, &frame.text);
                                }
                                line.syllables.push(Syllable {
                                    text: frame.text,
                                    start_time: begin,
                                    end_time: end.max(begin),
                                    is_background: frame.background,
                                });
                            }
                            _ => {
                                // untimed container span: surface its text
                                if !frame.background && !frame.text.is_empty() {
                                    push_word(&mut line.words, &frame.text);
                                }
                            }
                        }
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::ProviderParseError(format!("ttml text: {e}")))?;
                if let Some(frame) = span_stack.last_mut() {
                    frame.text.push_str(&text);
                } else if let Some(line) = current_line.as_mut() {
                    // inter-span whitespace and line-timed text
                    line.words.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if doc.lines.is_empty() {
        return Err(Error::ProviderParseError(
            "ttml contained no timed lines".to_string(),
        ));
    }
    Ok(doc)
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn push_word(words: &mut String, text: &str) {
    words.push_str(text);
}

/// Parse a TTML clock value into milliseconds.
///
/// Accepts `H:MM:SS.mmm`, `MM:SS.mmm`, bare seconds (`12.34`), and the
/// seconds-suffixed form `12.34s`.
pub fn parse_clock(value: &str) -> Option<f64> {
    let value = value.trim();
    let value = value.strip_suffix('s').unwrap_or(value);
    let parts: Vec<&str> = value.split(':').collect();
    let (hours, minutes, seconds): (f64, f64, f64) = match parts.as_slice() {
        [s] => (0.0, 0.0, s.parse().ok()?),
        [m, s] => (0.0, m.parse().ok()?, s.parse().ok()?),
        [h, m, s] => (h.parse().ok()?, m.parse().ok()?, s.parse().ok()?),
        _ => return None,
    };
    Some(((hours * 60.0 + minutes) * 60.0 + seconds) * 1000.0)
}
