//! StreamTitle matching and artist/title splitting
//!
//! Turns the text of one metadata block into a raw title through a chain of
//! increasingly lenient patterns, then splits it at the first `" - "`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::icy::ARTIST_TRACK_DELIMITER;

/// `StreamTitle` patterns, most to least well-formed.
///
/// Servers drop the trailing semicolon, and truncated blocks lose the closing
/// quote as well, so each pattern is only tried when the previous one missed.
const STREAM_TITLE_PATTERNS: [&str; 3] = [
    r"StreamTitle='(.*?)';",
    r"StreamTitle='(.*?)'",
    r"StreamTitle='(.*)",
];

fn stream_title_matchers() -> &'static [Regex] {
    static MATCHERS: OnceLock<Vec<Regex>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        STREAM_TITLE_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn stream_url_matcher() -> Option<&'static Regex> {
    static MATCHER: OnceLock<Option<Regex>> = OnceLock::new();
    MATCHER
        .get_or_init(|| Regex::new(r"StreamUrl='(.*?)';?").ok())
        .as_ref()
}

/// Parse an ICY metadata block to extract the `StreamTitle` value.
///
/// ICY metadata format: `StreamTitle='Artist - Song';StreamUrl='...';`
pub fn parse_stream_title(metadata: &str) -> Option<String> {
    stream_title_matchers()
        .iter()
        .find_map(|re| re.captures(metadata))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fields carried by one metadata block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFields {
    pub stream_title: Option<String>,
    pub stream_url: Option<String>,
}

impl MetadataFields {
    pub fn parse(metadata: &str) -> Self {
        Self {
            stream_title: parse_stream_title(metadata),
            stream_url: stream_url_matcher()
                .and_then(|re| re.captures(metadata))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        }
    }
}

/// Artist and track derived from a stream title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
}

impl TrackMetadata {
    /// Split a raw stream title on the first ` - `.
    ///
    /// "Artist - Title" → artist="Artist", title="Title". Without a separator
    /// the artist is empty and the whole (trimmed) string is the title.
    pub fn from_raw_title(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.is_empty()) else {
            return Self::default();
        };

        match raw.find(ARTIST_TRACK_DELIMITER) {
            Some(pos) => Self {
                artist: raw[..pos].trim().to_string(),
                title: raw[pos + ARTIST_TRACK_DELIMITER.len()..].trim().to_string(),
            },
            None => Self {
                artist: String::new(),
                title: raw.trim().to_string(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.artist.is_empty() && self.title.is_empty()
    }
}
