//! Host side of the bridge.
//!
//! Messages from the companion flow through a [`MessageSource`] into the
//! [`ProtocolStateMachine`], whose ordered handler chain updates the shared lifecycle and
//! calls back into the [`UiHost`]. [`IdlePump`] bounds how much of that happens per host
//! idle tick, and [`ExternalUi`] ties it to a spawned companion.

mod external;
mod handlers;
mod idle;
mod machine;
mod source;


use crate::log_debug;
use crate::state::UiLifecycleState;
use crossbeam_channel::{Sender, TrySendError};
use serde::Serialize;

pub use external::{ExternalUi, CONTROL_PORT_FORMAT};
pub use handlers::{Handled, HandlerContext, HostForwarder, LifecycleHandler, MessageHandler};
pub use idle::{IdlePump, IdleStatus};
pub use machine::{PollStatus, ProtocolStateMachine};
pub use source::{InlineSource, Incoming, MessageSource, ThreadedSource};

/// Callbacks into the embedding host.
pub trait UiHost {
    fn parameter_changed(&mut self, index: u32, value: f32);

    fn size_changed(&mut self, _width: u32, _height: u32) {}

    fn lifecycle_changed(&mut self, _state: UiLifecycleState) {}
}

/// The host callbacks as data, for hosts that prefer a queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    ParameterChanged { index: u32, value: f32 },
    SizeChanged { width: u32, height: u32 },
    Lifecycle { state: UiLifecycleState },
}

impl UiHost for Vec<UiEvent> {
    fn parameter_changed(&mut self, index: u32, value: f32) {
        self.push(UiEvent::ParameterChanged { index, value });
    }

    fn size_changed(&mut self, width: u32, height: u32) {
        self.push(UiEvent::SizeChanged { width, height });
    }

    fn lifecycle_changed(&mut self, state: UiLifecycleState) {
        self.push(UiEvent::Lifecycle { state });
    }
}

fn forward(sender: &Sender<UiEvent>, event: UiEvent) {
    match sender.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            log_debug(&format!("event queue full, dropping {event:?}"));
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Never blocks the idle thread: a full queue drops the event.
impl UiHost for Sender<UiEvent> {
    fn parameter_changed(&mut self, index: u32, value: f32) {
        forward(self, UiEvent::ParameterChanged { index, value });
    }

    fn size_changed(&mut self, width: u32, height: u32) {
        forward(self, UiEvent::SizeChanged { width, height });
    }

    fn lifecycle_changed(&mut self, state: UiLifecycleState) {
        forward(self, UiEvent::Lifecycle { state });
    }
}
