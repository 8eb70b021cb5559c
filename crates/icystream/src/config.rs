//! Configuration for the icystream engine

use std::time::Duration;

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("icystream/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Redirects followed before an attempt gives up
    pub const MAX_REDIRECTS: usize = 10;
}

/// ICY protocol configuration
pub mod icy {
    /// Request header that opts in to interleaved metadata
    pub const METADATA_REQUEST_HEADER: &str = "Icy-MetaData";

    /// Upper bound on bytes scanned for an in-band header block
    pub const HEADER_BYTE_LIMIT: usize = 100_000;

    /// Block length read before the length byte is known (255 × 16)
    pub const MAX_METADATA_LENGTH: usize = 4080;

    /// Default number of metadata blocks read before giving up on a valid one
    pub const METADATA_READ_MAX_RETRIES: u32 = 100;

    /// Separator between artist and track in a stream title
    pub const ARTIST_TRACK_DELIMITER: &str = " - ";
}

/// Per-retriever settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// Maximum metadata blocks read while looking for a valid one
    pub max_retries: u32,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Deadline for a whole attempt, from connecting until the last byte read.
    /// Checked before every body read and also used as the per-read socket
    /// timeout. `None` leaves reads unbounded.
    pub timeout: Option<Duration>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_retries: icy::METADATA_READ_MAX_RETRIES,
            user_agent: network::USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(network::CONNECT_TIMEOUT_SECS),
            timeout: None,
        }
    }
}

impl RetrieverConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
