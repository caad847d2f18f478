//! Serialises every write to the peer.
//!
//! The guard owns the [`LineWriter`] together with the lifecycle state, so a crash seen by
//! the reader and a write attempted by another thread are ordered by the same lock.

use crate::channel::{LineWriter, LINE_TERMINATOR};
use crate::error::ChannelError;
use crate::lock::lock_or_recover;
use crate::protocol::{encode_block, sanitize, Command};
use crate::state::{Liveness, UiLifecycleState, Visibility};
use crate::{log_debug, log_debug_content};
use std::sync::{Mutex, MutexGuard, TryLockError};

struct GuardedWriter {
    writer: Option<LineWriter>,
    lifecycle: UiLifecycleState,
}

impl GuardedWriter {
    fn enter_terminal(&mut self, liveness: Liveness) -> bool {
        let changed = self.lifecycle.set_liveness(liveness);
        if let Some(mut writer) = self.writer.take() {
            writer.close();
        }
        changed
    }
}

pub struct WriteGuard {
    slot: Mutex<GuardedWriter>,
}

impl WriteGuard {
    pub fn new(writer: LineWriter, lifecycle: UiLifecycleState) -> Self {
        Self {
            slot: Mutex::new(GuardedWriter {
                writer: Some(writer),
                lifecycle,
            }),
        }
    }

    /// Block until no other caller holds the writer.
    pub fn acquire(&self) -> PendingWrite<'_> {
        PendingWrite::new(lock_or_recover(&self.slot, "write guard"))
    }

    /// Take the writer only if nobody holds it right now.
    pub fn try_acquire(&self) -> Option<PendingWrite<'_>> {
        match self.slot.try_lock() {
            Ok(slot) => Some(PendingWrite::new(slot)),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => {
                log_debug("write guard: lock poisoned by a panicking writer, recovering");
                Some(PendingWrite::new(poisoned.into_inner()))
            }
        }
    }

    pub fn lifecycle(&self) -> UiLifecycleState {
        lock_or_recover(&self.slot, "write guard").lifecycle
    }

    /// True while a write would reach the pipe.
    pub fn is_writable(&self) -> bool {
        let slot = lock_or_recover(&self.slot, "write guard");
        slot.writer.is_some() && !slot.lifecycle.is_terminal()
    }

    /// Encode one message and write it as a single block.
    pub fn send(&self, command: Command, args: &[&str]) -> Result<(), ChannelError> {
        let mut pending = self.acquire();
        pending.push_message(command, args);
        pending.flush_and_release()
    }

    pub(crate) fn update_lifecycle<R>(&self, apply: impl FnOnce(&mut UiLifecycleState) -> R) -> R {
        let mut slot = lock_or_recover(&self.slot, "write guard");
        apply(&mut slot.lifecycle)
    }

    /// Enter `Crashed` and drop the writer. Returns false if already terminal.
    pub(crate) fn mark_crashed(&self) -> bool {
        lock_or_recover(&self.slot, "write guard").enter_terminal(Liveness::Crashed)
    }

    /// Enter `Closed` (peer said goodbye) and drop the writer.
    pub(crate) fn mark_closed(&self, hidden: bool) -> bool {
        let mut slot = lock_or_recover(&self.slot, "write guard");
        let mut changed = slot.enter_terminal(Liveness::Closed);
        if hidden {
            changed |= slot.lifecycle.set_visibility(Visibility::Hidden);
        }
        changed
    }
}

/// Exclusive hold on the writer. Lines pushed here reach the pipe as one contiguous block
/// on [`PendingWrite::flush_and_release`]; dropping without flushing discards them.
pub struct PendingWrite<'a> {
    slot: MutexGuard<'a, GuardedWriter>,
    block: Vec<u8>,
    closes_channel: bool,
}

impl<'a> PendingWrite<'a> {
    fn new(slot: MutexGuard<'a, GuardedWriter>) -> Self {
        Self {
            slot,
            block: Vec::new(),
            closes_channel: false,
        }
    }

    pub fn lifecycle(&self) -> UiLifecycleState {
        self.slot.lifecycle
    }

    pub fn buffered_bytes(&self) -> usize {
        self.block.len()
    }

    /// Queue a line verbatim. It must not contain the terminator.
    pub fn push_line(&mut self, text: &str) -> Result<(), ChannelError> {
        if text.as_bytes().contains(&LINE_TERMINATOR) {
            return Err(ChannelError::EmbeddedTerminator);
        }
        self.block.extend_from_slice(text.as_bytes());
        self.block.push(LINE_TERMINATOR);
        Ok(())
    }

    /// Queue a line after sanitizing it, so arbitrary text is always safe.
    pub fn push_fixed(&mut self, text: &str) {
        self.block.extend_from_slice(sanitize(text).as_bytes());
        self.block.push(LINE_TERMINATOR);
    }

    pub fn push_message(&mut self, command: Command, args: &[&str]) {
        if matches!(command, Command::Quit | Command::Exiting) {
            self.closes_channel = true;
        }
        self.block
            .extend_from_slice(&encode_block(command.token(), args));
    }

    /// Write everything queued with one `write_all`, then release the lock.
    pub fn flush_and_release(mut self) -> Result<(), ChannelError> {
        if self.block.is_empty() {
            return Ok(());
        }
        let block = std::mem::take(&mut self.block);
        if self.slot.lifecycle.is_terminal() {
            return Err(ChannelError::Closed);
        }
        let Some(writer) = self.slot.writer.as_mut() else {
            return Err(ChannelError::Closed);
        };
        log_debug_content(&format!(
            "send: {:?}",
            crate::logging::snippet(&String::from_utf8_lossy(&block), 120)
        ));
        match writer.write_all(&block) {
            Ok(()) => {
                if self.closes_channel {
                    self.slot.enter_terminal(Liveness::Closed);
                    tracing::info!("channel closed after goodbye message");
                }
                Ok(())
            }
            Err(err) => {
                if self.slot.enter_terminal(Liveness::Crashed) {
                    tracing::warn!(error = %err, "write to peer failed, marking crashed");
                }
                Err(err)
            }
        }
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if !self.block.is_empty() {
            log_debug(&format!(
                "write guard: released with {} unflushed bytes, discarding",
                self.block.len()
            ));
        }
    }
}
