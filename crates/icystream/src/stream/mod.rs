//! Stream handling
//!
//! Connects to ICY (Icecast/Shoutcast) streams, resolves station headers from
//! HTTP or in-band header blocks, reads interval metadata blocks under an
//! optional deadline and parses the stream title.

pub mod connection;
pub mod deadline;
pub mod header;
pub mod metadata;
pub mod reader;

pub use connection::{Connection, Connector, HttpConnector};
pub use deadline::DeadlineReader;
pub use header::{HeaderSource, StreamHeaderData};
pub use metadata::{parse_stream_title, MetadataFields, TrackMetadata};
pub use reader::MetadataBlockReader;
