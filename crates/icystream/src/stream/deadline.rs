//! Whole-attempt read deadline
//!
//! Socket read timeouts only bound the wait for the next byte, so a server
//! that trickles data never trips them. [`DeadlineReader`] checks a fixed
//! `Instant` before every read instead.

use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Fails reads with `TimedOut` once the deadline has passed
pub struct DeadlineReader<R> {
    inner: R,
    deadline: Option<Instant>,
}

impl<R: Read> DeadlineReader<R> {
    /// `None` disables the deadline
    pub fn new(inner: R, deadline: Option<Instant>) -> Self {
        Self { inner, deadline }
    }

    /// Time left before the deadline; `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl<R: Read> Read for DeadlineReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining() == Some(Duration::ZERO) {
            return Err(deadline_exceeded());
        }
        self.inner.read(buf)
    }
}

pub(crate) fn deadline_exceeded() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "attempt deadline exceeded")
}
