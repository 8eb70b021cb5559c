//! Error types for icystream
//!
//! Centralized error handling using thiserror. A retrieval attempt ends in
//! exactly one of two terminal kinds: a transport failure or a stream that
//! does not publish metadata.

use thiserror::Error;

/// Connection open/read failures at any stage of an attempt
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{}", friendly_network_error(.0))]
    Network(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Main error type for a retrieval attempt
#[derive(Error, Debug)]
pub enum IcyError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Stream does not support metadata: {url}")]
    UnsupportedStream { url: String },
}

/// Which terminal condition ended an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    UnsupportedStream,
}

impl IcyError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IcyError::Transport(_) => FailureKind::Transport,
            IcyError::UnsupportedStream { .. } => FailureKind::UnsupportedStream,
        }
    }

    pub fn is_unsupported_stream(&self) -> bool {
        self.kind() == FailureKind::UnsupportedStream
    }
}

impl From<reqwest::Error> for IcyError {
    fn from(e: reqwest::Error) -> Self {
        IcyError::Transport(TransportError::Network(e))
    }
}

impl From<std::io::Error> for IcyError {
    fn from(e: std::io::Error) -> Self {
        IcyError::Transport(TransportError::Io(e))
    }
}

/// Result type alias for icystream
pub type Result<T> = std::result::Result<T, IcyError>;

fn friendly_network_error(e: &reqwest::Error) -> String {
    if e.is_builder() {
        if let Some(url) = e.url() {
            return format!("Invalid URL: {url}");
        }
        return "Invalid URL".to_string();
    }
    if e.is_connect() {
        if let Some(url) = e.url() {
            return format!("Could not connect to {}", url.host_str().unwrap_or("server"));
        }
        return "Could not connect to server".to_string();
    }
    if e.is_timeout() {
        return "Connection timed out".to_string();
    }
    format!("Network error: {e}")
}
