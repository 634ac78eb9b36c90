//! Deadline-bounded line reader.
//!
//! [`Lines`] pulls from a [`Port`] until a `\n` has been buffered, then yields
//! the buffered text. [`Lines::next_bytes`] yields the same line undecoded. The deadline is fixed the first time the iterator is
//! polled: pulling a second line spends whatever budget the first one left.
//! A zero timeout still performs one read pass.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use log::trace;

use crate::error::AtResult;
use crate::transport::Port;

/// A lazy sequence of lines read under a single deadline.
///
/// Each yielded line keeps its terminator so callers that reassemble replies
/// see the exact framing. Ending without a line is not an error; a channel
/// failure is yielded once and ends the sequence.
pub struct Lines<'a> {
    port: &'a mut dyn Port,
    timeout: Duration,
    deadline: Option<Instant>,
    buffer: BytesMut,
    done: bool,
}

impl<'a> Lines<'a> {
    /// Read lines from `port` for at most `timeout`, starting at the first poll.
    pub fn new(port: &'a mut dyn Port, timeout: Duration) -> Self {
        Lines {
            port,
            timeout,
            deadline: None,
            buffer: BytesMut::new(),
            done: false,
        }
    }

    /// The deadline, once the first poll has fixed it.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        if !self.buffer.contains(&b'\n') {
            return None;
        }
        Some(self.buffer.split().to_vec())
    }

    fn pull(&mut self, deadline: Instant) -> AtResult<Option<Vec<u8>>> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.port.set_timeout(remaining)?;

            let chunk = self.port.read_line()?;
            if !chunk.is_empty() {
                trace!("{} -> {}", self.port.name(), chunk.escape_ascii());
                self.buffer.extend_from_slice(&chunk);
                if let Some(line) = self.take_line() {
                    return Ok(Some(line));
                }
            }

            if Instant::now() >= deadline {
                if !self.buffer.is_empty() {
                    trace!("dropping partial line: {}", self.buffer.escape_ascii());
                }
                return Ok(None);
            }
        }
    }

    /// The next line as raw bytes, terminator included.
    ///
    /// Payload-carrying replies go through here so that binary data is not
    /// mangled by text decoding.
    pub fn next_bytes(&mut self) -> Option<AtResult<Vec<u8>>> {
        if self.done {
            return None;
        }

        let deadline = match self.deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    self.done = true;
                    return None;
                }
                deadline
            }
            None => {
                let deadline = Instant::now() + self.timeout;
                self.deadline = Some(deadline);
                deadline
            }
        };

        match self.pull(deadline) {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Iterator for Lines<'_> {
    type Item = AtResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_bytes()
            .map(|line| line.map(|line| String::from_utf8_lossy(&line).into_owned()))
    }
}
