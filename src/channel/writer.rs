use super::counters::write_chunk_limit;
#[cfg(any(test, feature = "mutants"))]
use super::counters::guard_loop;
use super::fd::{poll_fd, set_nonblocking};
use super::LINE_TERMINATOR;
use crate::error::ChannelError;
use crate::log_debug;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::time::{Duration, Instant};

/// Write side of a pipe. Every successful call leaves whole lines in the pipe.
pub struct LineWriter {
    file: Option<File>,
    write_timeout: Duration,
}

impl LineWriter {
    pub fn new(fd: OwnedFd, write_timeout: Duration) -> Result<Self, ChannelError> {
        set_nonblocking(fd.as_fd())?;
        Ok(Self {
            file: Some(File::from(fd)),
            write_timeout,
        })
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Write `text` followed by the terminator.
    pub fn write_line(&mut self, text: &str) -> Result<(), ChannelError> {
        if text.as_bytes().contains(&LINE_TERMINATOR) {
            return Err(ChannelError::EmbeddedTerminator);
        }
        let mut framed = Vec::with_capacity(text.len() + 1);
        framed.extend_from_slice(text.as_bytes());
        framed.push(LINE_TERMINATOR);
        self.write_all(&framed)
    }

    /// Write an already framed block in full.
    ///
    /// Short writes and `EINTR` are retried. A full pipe is waited on until the write
    /// timeout; a peer that stops draining, a broken pipe, or a zero-length write closes
    /// the writer because a half-written line would corrupt the framing.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<(), ChannelError> {
        let deadline = Instant::now() + self.write_timeout;
        #[cfg(any(test, feature = "mutants"))]
        let guard_start = Instant::now();
        #[cfg(any(test, feature = "mutants"))]
        let mut guard_iters: usize = 0;
        while !data.is_empty() {
            #[cfg(any(test, feature = "mutants"))]
            {
                guard_iters += 1;
                guard_loop(guard_start, guard_iters, 10_000_000, "line writer");
            }
            let Some(file) = self.file.as_mut() else {
                return Err(ChannelError::Closed);
            };
            let len = write_chunk_limit(data.len());
            match file.write(&data[..len]) {
                Ok(0) => return Err(self.fail("write returned 0")),
                Ok(written) => data = &data[written.min(data.len())..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(self.fail("peer stopped draining the pipe"));
                    }
                    poll_fd(file.as_fd(), libc::POLLOUT, deadline - now)?;
                }
                Err(err) => return Err(self.fail(&err.to_string())),
            }
        }
        Ok(())
    }

    fn fail(&mut self, reason: &str) -> ChannelError {
        log_debug(&format!("line writer: {reason}, closing"));
        self.close();
        ChannelError::Closed
    }
}
