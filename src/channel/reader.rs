use super::fd::{poll_fd, set_nonblocking};
use super::{LineSource, LINE_TERMINATOR};
use crate::error::ChannelError;
use crate::log_debug;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, OwnedFd};
use std::time::{Duration, Instant};

const READ_CHUNK_BYTES: usize = 4096;

enum Fill {
    Data,
    Empty,
}

/// Read side of a pipe, framed into lines.
///
/// Bytes that do not yet form a full line stay buffered across calls, so a timeout never
/// loses data. Once the peer closes or the input grows past `max_line_bytes` without a
/// terminator, the reader closes itself for good.
pub struct LineReader {
    file: Option<File>,
    pending: Vec<u8>,
    scanned: usize,
    max_line_bytes: usize,
}

impl LineReader {
    pub fn new(fd: OwnedFd, max_line_bytes: usize) -> Result<Self, ChannelError> {
        set_nonblocking(fd.as_fd())?;
        Ok(Self {
            file: Some(File::from(fd)),
            pending: Vec::new(),
            scanned: 0,
            max_line_bytes,
        })
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Bytes buffered that are not yet part of a returned line.
    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }

    pub fn close(&mut self) {
        self.file = None;
        self.pending.clear();
        self.scanned = 0;
    }

    /// Read one line without its terminator.
    ///
    /// `None` or a zero timeout performs a single non-blocking attempt. `Ok(None)` means no
    /// complete line arrived in time; `Err(Closed)` means the peer went away first.
    pub fn read_line(&mut self, timeout: Option<Duration>) -> Result<Option<String>, ChannelError> {
        let deadline = timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if self.pending.len() > self.max_line_bytes {
                log_debug(&format!(
                    "line reader: {} bytes without a terminator (limit {}), closing",
                    self.pending.len(),
                    self.max_line_bytes
                ));
                self.close();
                return Err(ChannelError::Closed);
            }
            match self.fill()? {
                Fill::Data => continue,
                Fill::Empty => {
                    let Some(deadline) = deadline else {
                        return Ok(None);
                    };
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.wait_readable(deadline - now)?;
                }
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let offset = self.pending[self.scanned..]
            .iter()
            .position(|byte| *byte == LINE_TERMINATOR);
        match offset {
            Some(offset) => {
                let end = self.scanned + offset;
                let mut line: Vec<u8> = self.pending.drain(..=end).collect();
                line.pop();
                self.scanned = 0;
                Some(String::from_utf8_lossy(&line).into_owned())
            }
            None => {
                self.scanned = self.pending.len();
                None
            }
        }
    }

    fn fill(&mut self) -> Result<Fill, ChannelError> {
        let Some(file) = self.file.as_mut() else {
            return Err(ChannelError::Closed);
        };
        let mut buf = [0u8; READ_CHUNK_BYTES];
        match file.read(&mut buf) {
            Ok(0) => {
                if !self.pending.is_empty() {
                    log_debug(&format!(
                        "line reader: peer closed with {} unterminated bytes",
                        self.pending.len()
                    ));
                }
                self.close();
                Err(ChannelError::Closed)
            }
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(Fill::Data)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(Fill::Empty),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(Fill::Data),
            Err(err) => {
                log_debug(&format!("line reader: read failed: {err}"));
                self.close();
                Err(ChannelError::Closed)
            }
        }
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<(), ChannelError> {
        let Some(file) = self.file.as_ref() else {
            return Err(ChannelError::Closed);
        };
        poll_fd(file.as_fd(), libc::POLLIN, timeout)?;
        Ok(())
    }
}

impl LineSource for LineReader {
    fn next_line(&mut self, timeout: Option<Duration>) -> Result<Option<String>, ChannelError> {
        self.read_line(timeout)
    }
}
