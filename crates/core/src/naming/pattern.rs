//! Filename pattern parsing and rendering.
//!
//! Patterns use `%(key)s` substitutions with an optional zero-padded width
//! for numeric keys, e.g. `%(track-number)02d-%(title)s`. `%%` renders a
//! literal percent sign.

use regex_lite::Regex;
use std::fmt;

use crate::soundfile::SoundFile;

use super::NamingError;

/// Keys a pattern may reference.
const KNOWN_KEYS: &[&str] = &[
    "artist",
    "album",
    "album-artist",
    "title",
    "track-number",
    "track-total",
    "disc-number",
    "genre",
    "year",
    "filename",
    "timestamp",
];

#[derive(Debug, Clone, PartialEq)]
enum Conversion {
    Str,
    Int { width: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field { key: String, conv: Conversion },
}

/// A parsed filename pattern.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl FilenamePattern {
    /// Parses a pattern, rejecting unknown keys and stray `%`.
    pub fn parse(pattern: &str) -> Result<Self, NamingError> {
        let re = Regex::new(r"%\(([a-z0-9-]+)\)(\d*)([sd])|%%|%").expect("valid regex");
        let mut segments = Vec::new();
        let mut last_end = 0;

        for caps in re.captures_iter(pattern) {
            let m = caps.get(0).expect("match 0 always present");
            if m.start() > last_end {
                segments.push(Segment::Literal(pattern[last_end..m.start()].to_string()));
            }
            last_end = m.end();

            match m.as_str() {
                "%%" => segments.push(Segment::Literal("%".to_string())),
                "%" => {
                    return Err(NamingError::Malformed {
                        reason: format!("stray '%' at byte {} in {pattern:?}", m.start()),
                    });
                }
                _ => {
                    let key = caps.get(1).expect("key capture").as_str().to_string();
                    if !KNOWN_KEYS.contains(&key.as_str()) {
                        return Err(NamingError::UnknownKey { key });
                    }
                    let width = caps
                        .get(2)
                        .map(|w| w.as_str())
                        .filter(|w| !w.is_empty())
                        .map(|w| w.parse::<usize>().unwrap_or(0))
                        .unwrap_or(0);
                    let conv = match caps.get(3).expect("conversion capture").as_str() {
                        "d" => Conversion::Int { width },
                        _ => Conversion::Str,
                    };
                    segments.push(Segment::Field { key, conv });
                }
            }
        }

        if last_end < pattern.len() {
            segments.push(Segment::Literal(pattern[last_end..].to_string()));
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Whether rendering depends on the current time.
    ///
    /// Time-dependent patterns are excluded from the idempotence guarantee.
    pub fn is_time_dependent(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(s, Segment::Field { key, .. } if key == "timestamp")
        })
    }

    /// Renders the pattern for one sound file.
    ///
    /// Missing tags fall back to defined placeholders; slashes inside tag
    /// values are replaced so a value can never introduce a path separator.
    pub fn render(&self, sound_file: &SoundFile) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { key, conv } => {
                    let value = lookup(key, sound_file);
                    match conv {
                        Conversion::Str => out.push_str(&value.replace('/', "-")),
                        Conversion::Int { width } => {
                            let width = *width;
                            let n = value.trim().parse::<i64>().unwrap_or(0);
                            out.push_str(&format!("{n:0width$}"));
                        }
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for FilenamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolves one pattern key against a sound file, with defined fallbacks.
fn lookup(key: &str, sound_file: &SoundFile) -> String {
    if let Some(value) = sound_file.tag(key) {
        return value.to_string();
    }

    match key {
        "artist" => "Unknown Artist".to_string(),
        "album" => "Unknown Album".to_string(),
        "album-artist" => sound_file
            .tag("artist")
            .unwrap_or("Unknown Artist")
            .to_string(),
        "title" => "Unknown Title".to_string(),
        "genre" => "Unknown Genre".to_string(),
        "track-number" | "track-total" | "disc-number" | "year" => "0".to_string(),
        "filename" => sound_file.stem(),
        "timestamp" => chrono::Local::now().format("%Y%m%d-%H%M%S").to_string(),
        _ => String::new(),
    }
}
