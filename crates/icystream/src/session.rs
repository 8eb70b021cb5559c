//! Retrieval session
//!
//! Sequences one attempt: connect, resolve the station header, read a
//! metadata block, parse and split the title. The connection is owned by the
//! attempt and closed before the outcome is handed to the caller.

use std::io::BufReader;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RetrieverConfig;
use crate::error::{IcyError, Result};
use crate::stream::connection::{Connection, Connector, HttpConnector};
use crate::stream::deadline::{deadline_exceeded, DeadlineReader};
use crate::stream::header::{resolve_header, StreamHeaderData};
use crate::stream::metadata::{MetadataFields, TrackMetadata};
use crate::stream::reader::MetadataBlockReader;

/// Progress of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    ResolvingHeader,
    ReadingMetadata,
    Completed,
    Failed,
}

/// Outcome of a successful attempt, owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalResult {
    pub header: StreamHeaderData,
    #[serde(flatten)]
    pub track: TrackMetadata,
    /// Unsplit `StreamTitle` value, absent when no pattern matched
    pub raw_title: Option<String>,
}

impl RetrievalResult {
    pub fn artist(&self) -> &str {
        &self.track.artist
    }

    pub fn title(&self) -> &str {
        &self.track.title
    }
}

/// One retrieval attempt against one URL
pub struct RetrievalSession<'a> {
    url: &'a str,
    max_retries: u32,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    state: SessionState,
}

impl<'a> RetrievalSession<'a> {
    pub fn new(url: &'a str, max_retries: u32) -> Self {
        Self {
            url,
            max_retries,
            timeout: None,
            deadline: None,
            state: SessionState::Idle,
        }
    }

    /// Bound the whole attempt, connect included; `None` leaves it unbounded
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the attempt to completion.
    ///
    /// The connection is always dropped (closed) before this returns.
    pub fn run(&mut self, connector: &dyn Connector) -> Result<RetrievalResult> {
        self.deadline = self.timeout.map(|t| Instant::now() + t);
        self.transition(SessionState::Connecting);
        let outcome = connector
            .connect(self.url)
            .and_then(|connection| self.read_connection(connection));

        match &outcome {
            Ok(result) => {
                self.transition(SessionState::Completed);
                info!(
                    url = self.url,
                    artist = result.artist(),
                    title = result.title(),
                    "Retrieved stream metadata"
                );
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                warn!(url = self.url, "Stream data retrieval failed: {e}");
            }
        }
        outcome
    }

    fn read_connection(&mut self, connection: Connection) -> Result<RetrievalResult> {
        let Connection { headers, body } = connection;
        // A connect that overran the deadline fails here, before any read
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(deadline_exceeded().into());
        }
        let mut body = BufReader::new(DeadlineReader::new(body, self.deadline));

        self.transition(SessionState::ResolvingHeader);
        let header = resolve_header(&headers, &mut body)?;
        if !header.supports_metadata() {
            return Err(IcyError::UnsupportedStream {
                url: self.url.to_string(),
            });
        }

        self.transition(SessionState::ReadingMetadata);
        let meta_int = header.meta_int as usize;
        let block = MetadataBlockReader::new(&mut body, meta_int)
            .read_valid_block(header.name.as_deref(), self.max_retries)?;
        drop(body);

        let fields = MetadataFields::parse(&block);
        debug!(stream_url = ?fields.stream_url, "Parsed metadata block");
        let raw_title = fields.stream_title;
        let track = TrackMetadata::from_raw_title(raw_title.as_deref());

        Ok(RetrievalResult {
            header,
            track,
            raw_title,
        })
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }
}

/// Retrieves now-playing data from ICY streams.
///
/// `retrieve` is serialized per instance: a second concurrent caller waits
/// for the running attempt to finish. Every attempt starts from scratch.
pub struct IcyStreamRetriever<C: Connector = HttpConnector> {
    connector: C,
    config: RetrieverConfig,
    lock: Mutex<()>,
}

impl IcyStreamRetriever<HttpConnector> {
    /// Create a retriever that connects over HTTP(S)
    pub fn new(config: RetrieverConfig) -> Result<Self> {
        let connector = HttpConnector::new(&config)?;
        Ok(Self::with_connector(connector, config))
    }
}

impl<C: Connector> IcyStreamRetriever<C> {
    pub fn with_connector(connector: C, config: RetrieverConfig) -> Self {
        Self {
            connector,
            config,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Run one attempt on the calling thread
    pub fn retrieve(&self, url: &str) -> Result<RetrievalResult> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        RetrievalSession::new(url, self.config.max_retries)
            .with_timeout(self.config.timeout)
            .run(&self.connector)
    }
}

impl<C: Connector + 'static> IcyStreamRetriever<C> {
    /// Run one attempt on a background thread and hand the outcome to
    /// `on_complete`, called exactly once.
    pub fn retrieve_with<F>(self: &Arc<Self>, url: &str, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<RetrievalResult>) + Send + 'static,
    {
        let retriever = Arc::clone(self);
        let url = url.to_string();
        thread::spawn(move || on_complete(retriever.retrieve(&url)))
    }

    /// Run one attempt on a background thread; the outcome arrives once on
    /// the returned channel.
    pub fn retrieve_async(self: &Arc<Self>, url: &str) -> Receiver<Result<RetrievalResult>> {
        let (tx, rx) = bounded(1);
        self.retrieve_with(url, move |outcome| {
            // Receiver may have been dropped by a caller that lost interest
            let _ = tx.send(outcome);
        });
        rx
    }
}
