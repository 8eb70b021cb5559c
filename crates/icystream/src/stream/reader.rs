//! Interval-based metadata block reader
//!
//! An ICY stream carries `metaint` bytes of audio, then one length byte
//! (value × 16 = block size), then the zero-padded metadata block, repeating.

use std::io::{self, Read};

use tracing::{debug, trace};

use crate::config::icy::MAX_METADATA_LENGTH;

/// Reads metadata blocks from a stream positioned at an interval boundary
pub struct MetadataBlockReader<'a, R: Read> {
    stream: &'a mut R,
    meta_int: usize,
}

impl<'a, R: Read> MetadataBlockReader<'a, R> {
    pub fn new(stream: &'a mut R, meta_int: usize) -> Self {
        Self { stream, meta_int }
    }

    /// Read one interval plus its metadata block and return the block text.
    ///
    /// Positions are counted from 1 at the current stream position. Zero
    /// padding is discarded; an empty block yields an empty string. The
    /// stream ending early returns whatever was collected so far.
    pub fn read_block(&mut self) -> io::Result<String> {
        let offset = self.meta_int;
        let mut block_len = MAX_METADATA_LENGTH;
        let mut payload = Vec::new();

        for (index, byte) in (&mut *self.stream).bytes().enumerate() {
            let byte = byte?;
            let count = index + 1;

            if count == offset + 1 {
                block_len = usize::from(byte) * 16;
            }
            let in_data = count > offset + 1 && count < offset + block_len;
            if in_data && byte != 0 {
                payload.push(byte);
            }
            if count > offset + block_len {
                break;
            }
        }

        if payload.is_empty() {
            return Ok(String::new());
        }
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    /// Read blocks until one is valid or `max_retries` blocks have been read.
    ///
    /// Returns the last block read even when none was valid. Each attempt
    /// consumes a further interval of the live stream.
    pub fn read_valid_block(
        &mut self,
        station_name: Option<&str>,
        max_retries: u32,
    ) -> io::Result<String> {
        let mut block = String::new();

        for attempt in 1..=max_retries {
            block = self.read_block()?;
            if is_valid_block(&block, station_name) {
                debug!(attempt, "Read metadata block");
                return Ok(block);
            }
            trace!(attempt, "Metadata block empty or echoes station name");
        }

        debug!(max_retries, "No valid metadata block, using last one read");
        Ok(block)
    }
}

/// A block is usable unless it is empty or is the station name standing in
/// for real metadata.
pub fn is_valid_block(block: &str, station_name: Option<&str>) -> bool {
    if block.is_empty() {
        return false;
    }
    match station_name {
        Some(name) if !name.is_empty() => !block.contains(name),
        _ => true,
    }
}
