use super::idle::{IdlePump, IdleStatus};
use super::machine::ProtocolStateMachine;
use super::source::{InlineSource, MessageSource, ThreadedSource};
use super::UiHost;
use crate::config::BridgeConfig;
use crate::error::{ChannelError, SpawnError};
use crate::guard::WriteGuard;
use crate::process::{Connection, SpawnRequest, Supervisor, TerminateOutcome};
use crate::state::{UiLifecycleState, Visibility};
use std::sync::Arc;

const READER_QUEUE_CAPACITY: usize = 256;

/// Port event format for a single `f32` control value.
pub const CONTROL_PORT_FORMAT: u32 = 0;

/// A UI that is not shown on start is hidden until the companion says otherwise; one
/// that is shown stays `Unknown` until the companion confirms.
fn initial_state(config: &BridgeConfig) -> UiLifecycleState {
    let mut state = UiLifecycleState::running();
    if !config.show_on_start {
        state.set_visibility(Visibility::Hidden);
    }
    state
}

/// A running out-of-process UI as seen from the host.
///
/// Dropping it stops the companion.
pub struct ExternalUi<H: UiHost> {
    machine: ProtocolStateMachine,
    pump: IdlePump,
    host: H,
}

impl<H: UiHost> ExternalUi<H> {
    /// Spawn the companion, complete the handshake and start reading.
    pub fn launch(config: &BridgeConfig, request: &SpawnRequest, host: H) -> Result<Self, SpawnError> {
        let Connection {
            child,
            reader,
            writer,
        } = Supervisor::new(config).launch(request)?;
        let guard = Arc::new(WriteGuard::new(writer, initial_state(config)));
        let source: Box<dyn MessageSource + Send> = if config.threaded_reader {
            Box::new(
                ThreadedSource::spawn(reader, config.arg_timeout(), READER_QUEUE_CAPACITY)
                    .map_err(SpawnError::ReaderThread)?,
            )
        } else {
            Box::new(InlineSource::new(reader, config.arg_timeout()))
        };
        let machine = ProtocolStateMachine::new(source, guard, Some(child))
            .with_terminate_grace(config.terminate_grace());
        let ui = Self {
            machine,
            pump: IdlePump::new(config.max_messages_per_idle),
            host,
        };
        if config.show_on_start {
            ui.show()?;
        }
        Ok(ui)
    }

    /// Non-blocking host idle entry point.
    pub fn idle(&mut self) -> IdleStatus {
        self.pump.idle(&mut self.machine, &mut self.host)
    }

    pub fn show(&self) -> Result<(), ChannelError> {
        self.machine.writer().write_show()
    }

    pub fn hide(&self) -> Result<(), ChannelError> {
        self.machine.writer().write_hide()
    }

    pub fn focus(&self) -> Result<(), ChannelError> {
        self.machine.writer().write_focus()
    }

    /// Forward a host port change. Only format 0 with a 4-byte `f32` payload is sent;
    /// returns whether anything was written.
    pub fn port_event(&self, index: u32, format: u32, buffer: &[u8]) -> Result<bool, ChannelError> {
        if format != CONTROL_PORT_FORMAT {
            return Ok(false);
        }
        let Ok(bytes) = <[u8; 4]>::try_from(buffer) else {
            return Ok(false);
        };
        self.machine
            .writer()
            .write_control(index, f32::from_ne_bytes(bytes))?;
        Ok(true)
    }

    /// Shared writer for other threads that need to talk to the companion.
    pub fn writer(&self) -> Arc<WriteGuard> {
        Arc::clone(self.machine.writer())
    }

    pub fn lifecycle(&self) -> UiLifecycleState {
        self.machine.lifecycle()
    }

    pub fn pid(&self) -> Option<u32> {
        self.machine.pid()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Stop the companion now. Later calls return `None` and the eventual drop does
    /// nothing.
    pub fn terminate(&mut self) -> Option<TerminateOutcome> {
        self.machine.terminate()
    }
}

impl<H: UiHost> Drop for ExternalUi<H> {
    fn drop(&mut self) {
        self.machine.terminate();
    }
}
