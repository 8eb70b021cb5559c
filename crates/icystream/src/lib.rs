//! icystream — ICY Now-Playing Retrieval
//!
//! Station header resolution, metadata block extraction and stream title
//! parsing for Icecast/Shoutcast streams.
//!
//! ## Quick start
//!
//! ```no_run
//! use icystream::config::RetrieverConfig;
//! use icystream::IcyStreamRetriever;
//!
//! let retriever = IcyStreamRetriever::new(RetrieverConfig::default())?;
//! let result = retriever.retrieve("http://example.com:8000/stream")?;
//! println!("{} - {}", result.artist(), result.title());
//! # Ok::<(), icystream::error::IcyError>(())
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod stream;

#[cfg(test)]
mod test_util;

pub use error::{FailureKind, IcyError};
pub use session::{IcyStreamRetriever, RetrievalResult, RetrievalSession, SessionState};
pub use stream::{StreamHeaderData, TrackMetadata};
