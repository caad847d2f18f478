use crate::channel::LineReader;
use crate::error::ProtocolError;
use crate::log_debug;
use crate::protocol::{decode_message, Message};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const READER_POLL_SLICE: Duration = Duration::from_millis(20);

/// One result of asking a source for the next message.
#[derive(Debug)]
pub enum Incoming {
    Message(Message),
    /// Nothing complete is available right now.
    Empty,
    /// The peer is gone; no further messages will arrive.
    Closed,
    /// A message was read but could not be decoded and was dropped.
    Dropped(ProtocolError),
}

/// Where decoded messages come from. Never blocks longer than one message's argument reads.
pub trait MessageSource {
    fn next_message(&mut self) -> Incoming;

    /// False while bytes the peer already wrote may still turn into messages. A dead
    /// companion only counts as crashed once its source has settled.
    fn is_settled(&self) -> bool {
        true
    }
}

fn read_one(reader: &mut LineReader, first_line: String, arg_timeout: Duration) -> Incoming {
    match decode_message(first_line, reader, arg_timeout) {
        Ok(message) => Incoming::Message(message),
        Err(err) if err.is_fatal() => Incoming::Closed,
        Err(err) => Incoming::Dropped(err),
    }
}

/// Reads on the caller's thread: the first line without waiting, arguments with
/// `arg_timeout` each.
pub struct InlineSource {
    reader: LineReader,
    arg_timeout: Duration,
}

impl InlineSource {
    pub fn new(reader: LineReader, arg_timeout: Duration) -> Self {
        Self {
            reader,
            arg_timeout,
        }
    }
}

impl MessageSource for InlineSource {
    fn next_message(&mut self) -> Incoming {
        match self.reader.read_line(None) {
            Ok(Some(line)) => read_one(&mut self.reader, line, self.arg_timeout),
            Ok(None) => Incoming::Empty,
            Err(_) => Incoming::Closed,
        }
    }
}

/// A dedicated thread owns the reader and queues decoded messages; the idle thread only
/// drains the queue.
pub struct ThreadedSource {
    rx: Receiver<Incoming>,
    stop: Arc<AtomicBool>,
    eof_seen: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadedSource {
    pub fn spawn(reader: LineReader, arg_timeout: Duration, capacity: usize) -> io::Result<Self> {
        let (tx, rx) = bounded(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let eof_seen = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_eof = Arc::clone(&eof_seen);
        let handle = thread::Builder::new()
            .name("ui-bridge-reader".to_string())
            .spawn(move || reader_loop(reader, arg_timeout, tx, thread_stop, thread_eof))?;
        Ok(Self {
            rx,
            stop,
            eof_seen,
            handle: Some(handle),
        })
    }
}

fn reader_loop(
    mut reader: LineReader,
    arg_timeout: Duration,
    tx: Sender<Incoming>,
    stop: Arc<AtomicBool>,
    eof_seen: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        let incoming = match reader.read_line(Some(READER_POLL_SLICE)) {
            Ok(None) => continue,
            Ok(Some(line)) => read_one(&mut reader, line, arg_timeout),
            Err(_) => Incoming::Closed,
        };
        let closed = matches!(incoming, Incoming::Closed);
        if closed {
            // Everything read before EOF is already queued.
            eof_seen.store(true, Ordering::Release);
        }
        if tx.send(incoming).is_err() || closed {
            break;
        }
    }
    log_debug("reader thread: exiting");
}

impl MessageSource for ThreadedSource {
    fn next_message(&mut self) -> Incoming {
        match self.rx.try_recv() {
            Ok(incoming) => incoming,
            Err(TryRecvError::Empty) => Incoming::Empty,
            Err(TryRecvError::Disconnected) => Incoming::Closed,
        }
    }

    fn is_settled(&self) -> bool {
        self.eof_seen.load(Ordering::Acquire) && self.rx.is_empty()
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Disconnect so a reader blocked on a full queue wakes up.
        drop(std::mem::replace(&mut self.rx, crossbeam_channel::never()));
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log_debug("reader thread panicked");
            }
        }
    }
}
