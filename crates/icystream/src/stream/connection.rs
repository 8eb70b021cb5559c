//! Stream connections
//!
//! A [`Connector`] opens one connection per retrieval attempt and hands back
//! the response headers together with the raw body stream.
//!
//! Plain `http://` streams are requested over a bare socket so the request
//! bytes are exact and SHOUTcast's `ICY 200 OK` status line is accepted.
//! `https://` streams go through reqwest.

use std::io::{self, BufReader, Cursor, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, LOCATION};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::config::icy::METADATA_REQUEST_HEADER;
use crate::config::network::MAX_REDIRECTS;
use crate::config::RetrieverConfig;
use crate::error::{Result, TransportError};
use crate::stream::deadline::DeadlineReader;
use crate::stream::header::read_stream_header_block;

/// An open stream: transport headers plus the unread body
pub struct Connection {
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

impl Connection {
    pub fn new(headers: HeaderMap, body: impl Read + Send + 'static) -> Self {
        Self {
            headers,
            body: Box::new(body),
        }
    }
}

/// Opens stream connections for a retriever
pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Connection>;
}

/// HTTP(S) connector.
///
/// Asks for interleaved metadata, sends no `Accept` or compression
/// negotiation on plain HTTP and keeps the body byte-exact. Redirects are
/// followed up to [`MAX_REDIRECTS`].
pub struct HttpConnector {
    client: reqwest::blocking::Client,
    user_agent: String,
    connect_timeout: Duration,
    timeout: Option<Duration>,
}

/// What a plain HTTP exchange produced
enum PlainResponse {
    Open(Connection),
    Redirect(Url),
}

impl HttpConnector {
    pub fn new(config: &RetrieverConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(TransportError::Network)?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout,
            timeout: config.timeout.filter(|t| !t.is_zero()),
        })
    }

    fn connect_tls(&self, url: &Url) -> Result<Connection> {
        let response = self
            .client
            .get(url.as_str())
            .header(METADATA_REQUEST_HEADER, "1")
            .header(CONNECTION, HeaderValue::from_static("close"))
            .send()
            .map_err(TransportError::Network)?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()).into());
        }

        debug!(status = %response.status(), "Connected to {}", url);
        let headers = response.headers().clone();
        Ok(Connection::new(headers, response))
    }

    fn connect_plain(&self, url: &Url) -> Result<PlainResponse> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let stream = self.open_socket(url)?;
        (&stream)
            .write_all(request_head(url, &self.user_agent).as_bytes())
            .map_err(TransportError::Io)?;

        let mut reader = BufReader::new(DeadlineReader::new(stream, deadline));
        let head = read_stream_header_block(&mut reader)
            .map_err(TransportError::Io)?
            .ok_or_else(|| TransportError::Protocol(format!("no response header from {url}")))?;

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let (icy, status) = parse_status_line(status_line)?;

        if icy {
            if !status.is_success() {
                return Err(TransportError::Status(status).into());
            }
            // SHOUTcast v1: the header lines are left for the in-band resolver
            debug!(status = %status, "Connected to {} (ICY status line)", url);
            let body = Cursor::new(head.into_bytes()).chain(reader);
            return Ok(PlainResponse::Open(Connection::new(HeaderMap::new(), body)));
        }

        let headers = parse_header_lines(lines);
        if status.is_redirection() {
            if let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) {
                let next = url.join(location).map_err(TransportError::InvalidUrl)?;
                return Ok(PlainResponse::Redirect(next));
            }
        }
        if !status.is_success() {
            return Err(TransportError::Status(status).into());
        }

        debug!(status = %status, "Connected to {}", url);
        Ok(PlainResponse::Open(Connection::new(headers, reader)))
    }

    fn open_socket(&self, url: &Url) -> Result<TcpStream> {
        let addrs = url
            .socket_addrs(|| Some(80))
            .map_err(TransportError::Io)?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(self.timeout)
                        .and_then(|_| stream.set_write_timeout(self.timeout))
                        .map_err(TransportError::Io)?;
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%addr, "Connect failed: {err}");
                    last_err = Some(err);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {url}"))
        });
        Err(TransportError::Io(err).into())
    }
}

impl Connector for HttpConnector {
    fn connect(&self, url: &str) -> Result<Connection> {
        let mut url = Url::parse(url).map_err(TransportError::InvalidUrl)?;

        for _ in 0..=MAX_REDIRECTS {
            if url.scheme() != "http" {
                return self.connect_tls(&url);
            }
            match self.connect_plain(&url)? {
                PlainResponse::Open(connection) => return Ok(connection),
                PlainResponse::Redirect(next) => {
                    debug!("Redirected from {} to {}", url, next);
                    url = next;
                }
            }
        }

        Err(TransportError::Protocol(format!("too many redirects, last was {url}")).into())
    }
}

fn request_head(url: &Url, user_agent: &str) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host = url.host_str().unwrap_or_default();
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    format!(
        "GET {target} HTTP/1.0\r\n\
         Host: {host}\r\n\
         User-Agent: {user_agent}\r\n\
         {METADATA_REQUEST_HEADER}: 1\r\n\
         Connection: close\r\n\
         \r\n"
    )
}

/// Split `HTTP/1.x 200 OK` or `ICY 200 OK`; the flag is true for `ICY`
fn parse_status_line(line: &str) -> Result<(bool, StatusCode)> {
    let mut parts = line.split_whitespace();
    let protocol = parts.next().unwrap_or_default();
    let icy = protocol == "ICY";
    if !icy && !protocol.starts_with("HTTP/") {
        return Err(TransportError::Protocol(format!("unrecognized status line: {line:?}")).into());
    }

    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| TransportError::Protocol(format!("bad status code: {line:?}")))?;
    Ok((icy, status))
}

/// Collect `name: value` lines; malformed lines are skipped
fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = HeaderName::from_bytes(name.trim().as_bytes());
        let value = HeaderValue::from_bytes(value.trim().as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            headers.append(name, value);
        }
    }
    headers
}
