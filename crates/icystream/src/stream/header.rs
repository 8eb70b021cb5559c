//! Station header resolution
//!
//! ICY servers announce station attributes either as HTTP response headers
//! (`icy-metaint`, `icy-name`, ...) or, when they do not speak plain HTTP, as
//! a `\r\n`-separated header block at the very start of the byte stream.

use std::io::{self, Read};

use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::icy::HEADER_BYTE_LIMIT;

pub const ICY_BR: &str = "icy-br";
pub const ICY_GENRE: &str = "icy-genre";
pub const ICY_NAME: &str = "icy-name";
pub const ICY_URL: &str = "icy-url";
pub const ICY_PUB: &str = "icy-pub";
pub const ICY_METAINT: &str = "icy-metaint";

/// Where the station attributes were read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderSource {
    /// Transport-level response headers
    Http,
    /// Header block at the start of the stream body
    InBand,
    /// No header block found within the byte budget
    Missing,
}

/// Station attributes announced by an ICY server.
///
/// Numeric fields are -1 when absent or unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamHeaderData {
    pub bit_rate: i32,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "pub")]
    pub public: i32,
    pub meta_int: i32,
    #[serde(skip)]
    pub source: HeaderSource,
}

impl Default for StreamHeaderData {
    fn default() -> Self {
        Self {
            bit_rate: -1,
            genre: None,
            name: None,
            url: None,
            public: -1,
            meta_int: -1,
            source: HeaderSource::Missing,
        }
    }
}

impl StreamHeaderData {
    /// Read all attributes from transport headers
    pub fn from_http_headers(headers: &HeaderMap) -> Self {
        let field = |name: &str| {
            headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        };

        Self {
            bit_rate: parse_int(field(ICY_BR).as_deref()),
            genre: field(ICY_GENRE),
            name: field(ICY_NAME).map(|n| decode_name(&n)),
            url: field(ICY_URL).and_then(|u| decode_url(&u)),
            public: parse_int(field(ICY_PUB).as_deref()),
            meta_int: parse_int(field(ICY_METAINT).as_deref()),
            source: HeaderSource::Http,
        }
    }

    /// Read all attributes from an in-band header block
    pub fn from_stream_header(block: &str) -> Self {
        let field = |name: &str| stream_header_field(block, name);

        Self {
            bit_rate: parse_int(field(ICY_BR).as_deref()),
            genre: field(ICY_GENRE),
            name: field(ICY_NAME),
            url: field(ICY_URL).and_then(|u| decode_url(&u)),
            public: parse_int(field(ICY_PUB).as_deref()),
            meta_int: parse_int(field(ICY_METAINT).as_deref()),
            source: HeaderSource::InBand,
        }
    }

    /// True when the server interleaves metadata blocks
    pub fn supports_metadata(&self) -> bool {
        self.meta_int > 0
    }

    /// Advertised bitrate, absent when unknown or negative
    pub fn bit_rate_kbps(&self) -> Option<u32> {
        u32::try_from(self.bit_rate).ok()
    }
}

/// Populate a [`StreamHeaderData`] for a freshly opened connection.
///
/// Only reads from `body` when the transport headers carry no `icy-metaint`;
/// the bytes consumed by the scan are not replayed.
pub fn resolve_header<R: Read>(
    headers: &HeaderMap,
    body: &mut R,
) -> io::Result<StreamHeaderData> {
    if headers.contains_key(ICY_METAINT) {
        debug!("ICY headers sent via HTTP");
        return Ok(StreamHeaderData::from_http_headers(headers));
    }

    debug!("No icy-metaint header, scanning stream for in-band headers");
    match read_stream_header_block(body)? {
        Some(block) => Ok(StreamHeaderData::from_stream_header(&block)),
        None => {
            warn!("No in-band header block within {} bytes", HEADER_BYTE_LIMIT);
            Ok(StreamHeaderData::default())
        }
    }
}

/// Accumulate bytes until a blank line (`\r\n\r\n`) ends the header block.
///
/// Returns `None` when the byte budget runs out or the stream ends first.
pub fn read_stream_header_block<R: Read>(body: &mut R) -> io::Result<Option<String>> {
    let mut block = Vec::with_capacity(1024);

    for (count, byte) in body.bytes().enumerate() {
        if count >= HEADER_BYTE_LIMIT {
            return Ok(None);
        }
        block.push(byte?);
        if block.len() > 5 && block.ends_with(b"\r\n\r\n") {
            return Ok(Some(String::from_utf8_lossy(&block).into_owned()));
        }
    }

    Ok(None)
}

/// Extract `\r\n<name>:<value>\r\n` from an in-band header block
fn stream_header_field(block: &str, name: &str) -> Option<String> {
    let pattern = format!(r"\r\n({}):\s*(.*)\r\n", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(block)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

fn parse_int(value: Option<&str>) -> i32 {
    value.and_then(|v| v.parse::<i32>().ok()).unwrap_or(-1)
}

/// Form-decode a station URL; malformed escapes or invalid UTF-8 yield `None`.
fn decode_url(value: &str) -> Option<String> {
    if !has_valid_escapes(value) {
        return None;
    }
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(|s| s.into_owned())
}

/// Percent-decode a station name, keeping it verbatim when it does not decode
fn decode_name(value: &str) -> String {
    if !has_valid_escapes(value) {
        return value.to_string();
    }
    urlencoding::decode(value)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn has_valid_escapes(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};
    use std::io::Cursor;

    fn headers(fields: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in fields {
            let name = HeaderName::from_bytes(name.as_bytes()).unwrap();
            map.insert(name, HeaderValue::from_static(*value));
        }
        map
    }

    // --- HTTP headers ---

    #[test]
    fn http_headers_parsed() {
        let map = headers(&[
            ("icy-metaint", "16000"),
            ("icy-br", "128"),
            ("icy-name", "Test%20FM"),
        ]);
        let h = StreamHeaderData::from_http_headers(&map);
        assert_eq!(h.meta_int, 16000);
        assert_eq!(h.bit_rate, 128);
        assert_eq!(h.name.as_deref(), Some("Test FM"));
        assert_eq!(h.source, HeaderSource::Http);
        assert!(h.supports_metadata());
    }

    #[test]
    fn http_non_ascii_name_kept() {
        let mut map = headers(&[("icy-metaint", "8")]);
        map.insert("icy-name", HeaderValue::from_bytes("Café Paris".as_bytes()).unwrap());
        let h = StreamHeaderData::from_http_headers(&map);
        assert_eq!(h.name.as_deref(), Some("Café Paris"));
    }

    #[test]
    fn http_missing_fields_default() {
        let map = headers(&[("icy-metaint", "8192")]);
        let h = StreamHeaderData::from_http_headers(&map);
        assert_eq!(h.bit_rate, -1);
        assert_eq!(h.public, -1);
        assert!(h.genre.is_none());
        assert!(h.name.is_none());
        assert!(h.url.is_none());
        assert_eq!(h.bit_rate_kbps(), None);
    }

    #[test]
    fn http_unparseable_numbers() {
        let map = headers(&[
            ("icy-metaint", "lots"),
            ("icy-br", "128kbps"),
            ("icy-pub", "yes"),
        ]);
        let h = StreamHeaderData::from_http_headers(&map);
        assert_eq!(h.meta_int, -1);
        assert_eq!(h.bit_rate, -1);
        assert_eq!(h.public, -1);
        assert!(!h.supports_metadata());
    }

    #[test]
    fn http_header_names_case_insensitive() {
        let map = headers(&[("ICY-METAINT", "32768"), ("Icy-Genre", "Jazz")]);
        let h = StreamHeaderData::from_http_headers(&map);
        assert_eq!(h.meta_int, 32768);
        assert_eq!(h.genre.as_deref(), Some("Jazz"));
    }

    #[test]
    fn http_url_decoded() {
        let map = headers(&[
            ("icy-metaint", "16000"),
            ("icy-url", "http%3A%2F%2Fradio.example%2Fhome"),
            ("icy-pub", "1"),
        ]);
        let h = StreamHeaderData::from_http_headers(&map);
        assert_eq!(h.url.as_deref(), Some("http://radio.example/home"));
        assert_eq!(h.public, 1);
    }

    #[test]
    fn http_url_decode_failure_is_absent() {
        let map = headers(&[("icy-metaint", "16000"), ("icy-url", "http://x/%zz")]);
        let h = StreamHeaderData::from_http_headers(&map);
        assert!(h.url.is_none());
    }

    #[test]
    fn http_name_with_bare_percent_kept() {
        let map = headers(&[("icy-metaint", "16000"), ("icy-name", "100% Hits")]);
        let h = StreamHeaderData::from_http_headers(&map);
        assert_eq!(h.name.as_deref(), Some("100% Hits"));
    }

    #[test]
    fn resolve_prefers_http_headers() {
        let map = headers(&[("icy-metaint", "16000")]);
        let mut body = Cursor::new(b"audio bytes".to_vec());
        let h = resolve_header(&map, &mut body).unwrap();
        assert_eq!(h.meta_int, 16000);
        // Body untouched
        assert_eq!(body.position(), 0);
    }

    // --- In-band headers ---

    const IN_BAND: &[u8] = b"ICY 200 OK\r\n\
        icy-notice1: <BR>This stream requires Winamp<BR>\r\n\
        icy-name: Lounge Radio\r\n\
        icy-genre: Chillout\r\n\
        icy-url: http://lounge.example\r\n\
        icy-pub: 0\r\n\
        icy-metaint: 8192\r\n\
        icy-br: 96\r\n\
        \r\n";

    #[test]
    fn in_band_headers_parsed() {
        let mut data = IN_BAND.to_vec();
        data.extend_from_slice(&[0xFF, 0xFB, 0x90]);
        let mut body = Cursor::new(data);

        let h = resolve_header(&HeaderMap::new(), &mut body).unwrap();
        assert_eq!(h.source, HeaderSource::InBand);
        assert_eq!(h.name.as_deref(), Some("Lounge Radio"));
        assert_eq!(h.genre.as_deref(), Some("Chillout"));
        assert_eq!(h.url.as_deref(), Some("http://lounge.example"));
        assert_eq!(h.public, 0);
        assert_eq!(h.meta_int, 8192);
        assert_eq!(h.bit_rate, 96);
        // Stream continues right after the blank line
        assert_eq!(body.position() as usize, IN_BAND.len());
    }

    #[test]
    fn in_band_missing_field() {
        let block = "ICY 200 OK\r\nicy-name: X\r\n\r\n";
        let h = StreamHeaderData::from_stream_header(block);
        assert_eq!(h.name.as_deref(), Some("X"));
        assert_eq!(h.meta_int, -1);
        assert_eq!(h.bit_rate, -1);
    }

    #[test]
    fn in_band_first_match_wins() {
        let block = "ICY 200 OK\r\nicy-br: 64\r\nicy-br: 128\r\n\r\n";
        assert_eq!(StreamHeaderData::from_stream_header(block).bit_rate, 64);
    }

    #[test]
    fn in_band_budget_exceeded() {
        let mut body = Cursor::new(vec![b'a'; HEADER_BYTE_LIMIT + 10]);
        assert_eq!(read_stream_header_block(&mut body).unwrap(), None);
        assert_eq!(body.position() as usize, HEADER_BYTE_LIMIT + 1);

        let mut body = Cursor::new(vec![b'a'; HEADER_BYTE_LIMIT + 10]);
        let h = resolve_header(&HeaderMap::new(), &mut body).unwrap();
        assert_eq!(h, StreamHeaderData::default());
        assert!(!h.supports_metadata());
    }

    #[test]
    fn in_band_terminator_at_budget_edge() {
        let mut data = vec![b'a'; HEADER_BYTE_LIMIT - 4];
        data.extend_from_slice(b"\r\n\r\n");
        let mut body = Cursor::new(data);
        assert!(read_stream_header_block(&mut body).unwrap().is_some());
    }

    #[test]
    fn in_band_stream_ends_early() {
        let mut body = Cursor::new(b"ICY 200 OK\r\nicy-br: 64\r\n".to_vec());
        assert_eq!(read_stream_header_block(&mut body).unwrap(), None);
    }

    #[test]
    fn in_band_short_prefix_not_terminator() {
        // A blank line needs more than five bytes accumulated to count
        let mut body = Cursor::new(b"\r\n\r\nicy-br: 64\r\n\r\n".to_vec());
        let block = read_stream_header_block(&mut body).unwrap().unwrap();
        assert_eq!(block, "\r\n\r\nicy-br: 64\r\n\r\n");
        assert_eq!(StreamHeaderData::from_stream_header(&block).bit_rate, 64);
    }

    // --- helpers ---

    #[test]
    fn parse_int_variants() {
        assert_eq!(parse_int(Some("42")), 42);
        assert_eq!(parse_int(Some("-7")), -7);
        assert_eq!(parse_int(Some(" 42")), -1);
        assert_eq!(parse_int(Some("")), -1);
        assert_eq!(parse_int(None), -1);
    }

    #[test]
    fn decode_url_form_encoding() {
        assert_eq!(decode_url("a+b%21").as_deref(), Some("a b!"));
        assert_eq!(decode_url("%").as_deref(), None);
        assert_eq!(decode_url("%4").as_deref(), None);
        assert_eq!(decode_url("%FF").as_deref(), None);
    }

    #[test]
    fn header_data_serializes_pub_field() {
        let h = StreamHeaderData {
            bit_rate: 128,
            name: Some("Test FM".to_string()),
            meta_int: 16000,
            public: 1,
            ..StreamHeaderData::default()
        };
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["pub"], 1);
        assert_eq!(json["bit_rate"], 128);
        assert_eq!(json["name"], "Test FM");
        assert!(json.get("source").is_none());
    }
}
