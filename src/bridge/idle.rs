use super::machine::{PollStatus, ProtocolStateMachine};
use super::UiHost;
use crate::state::Visibility;

/// What the host should do with the UI after an idle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStatus {
    KeepAlive,
    /// The companion hid its window during this call.
    Hide,
    /// The companion crashed or closed; release the UI.
    TearDown,
}

impl IdleStatus {
    /// Integer form of plugin UI idle interfaces: 0 keeps the UI, non-zero closes it.
    pub fn as_host_code(self) -> i32 {
        match self {
            IdleStatus::KeepAlive => 0,
            IdleStatus::Hide | IdleStatus::TearDown => 1,
        }
    }
}

/// Drains a bounded number of messages per host idle tick.
#[derive(Debug, Clone, Copy)]
pub struct IdlePump {
    max_messages: usize,
}

impl IdlePump {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
        }
    }

    pub fn idle(&self, machine: &mut ProtocolStateMachine, host: &mut dyn UiHost) -> IdleStatus {
        let before = machine.lifecycle().visibility;
        for _ in 0..self.max_messages {
            let step = machine.step(host);
            if step.status == PollStatus::Crashed {
                return IdleStatus::TearDown;
            }
            if !step.consumed {
                break;
            }
        }
        let after = machine.lifecycle();
        if after.is_terminal() {
            IdleStatus::TearDown
        } else if after.visibility == Visibility::Hidden && before != Visibility::Hidden {
            IdleStatus::Hide
        } else {
            IdleStatus::KeepAlive
        }
    }
}
