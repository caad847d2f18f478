//! Newline-framed pipe endpoints.
//!
//! A [`LineChannel`] owns one readable and one writable pipe end. Reads honour a timeout
//! and keep partial input buffered; writes are all-or-nothing per call.

mod counters;
pub(crate) mod fd;
mod reader;
mod writer;

#[cfg(test)]
mod tests;

use crate::config::{DEFAULT_MAX_LINE_BYTES, DEFAULT_WRITE_TIMEOUT_MS};
use crate::error::ChannelError;
use std::os::fd::OwnedFd;
use std::time::Duration;

pub use reader::LineReader;
pub use writer::LineWriter;

/// Terminates every line on the wire.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Something that yields lines with a timeout; implemented by [`LineReader`].
pub trait LineSource {
    fn next_line(&mut self, timeout: Option<Duration>) -> Result<Option<String>, ChannelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    pub max_line_bytes: usize,
    pub write_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
        }
    }
}

/// A reader and a writer bound to one peer.
pub struct LineChannel {
    reader: LineReader,
    writer: LineWriter,
}

impl LineChannel {
    pub fn from_fds(
        recv: OwnedFd,
        send: OwnedFd,
        options: &ChannelOptions,
    ) -> Result<Self, ChannelError> {
        Ok(Self {
            reader: LineReader::new(recv, options.max_line_bytes)?,
            writer: LineWriter::new(send, options.write_timeout)?,
        })
    }

    /// False once either direction has been closed.
    pub fn is_running(&self) -> bool {
        self.reader.is_open() && self.writer.is_open()
    }

    pub fn read_line(&mut self, timeout: Option<Duration>) -> Result<Option<String>, ChannelError> {
        self.reader.read_line(timeout)
    }

    pub fn write_line(&mut self, text: &str) -> Result<(), ChannelError> {
        self.writer.write_line(text)
    }

    pub fn close(&mut self) {
        self.reader.close();
        self.writer.close();
    }

    pub fn into_parts(self) -> (LineReader, LineWriter) {
        (self.reader, self.writer)
    }
}
