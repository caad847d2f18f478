use super::handlers::{default_handlers, Handled, HandlerContext, MessageHandler};
use super::source::{Incoming, MessageSource};
use super::UiHost;
use crate::guard::WriteGuard;
use crate::process::{ChildProcess, TerminateOutcome};
use crate::protocol::{Command, Message};
use crate::state::{Liveness, UiLifecycleState};
use crate::{log_debug, log_debug_content};
use std::sync::Arc;
use std::time::Duration;

/// Edge-triggered result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Idle,
    StateChanged,
    Crashed,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Step {
    pub(crate) status: PollStatus,
    pub(crate) consumed: bool,
}

impl Step {
    fn idle(consumed: bool) -> Self {
        Self {
            status: PollStatus::Idle,
            consumed,
        }
    }
}

/// Interprets incoming messages and owns the lifecycle of one companion.
pub struct ProtocolStateMachine {
    source: Box<dyn MessageSource + Send>,
    guard: Arc<WriteGuard>,
    handlers: Vec<Box<dyn MessageHandler + Send>>,
    child: Option<ChildProcess>,
    terminate_grace: Duration,
}

impl ProtocolStateMachine {
    /// `child` is optional so a machine can run over bare pipes.
    pub fn new(
        source: Box<dyn MessageSource + Send>,
        guard: Arc<WriteGuard>,
        child: Option<ChildProcess>,
    ) -> Self {
        Self {
            source,
            guard,
            handlers: default_handlers(),
            child,
            terminate_grace: Duration::from_millis(crate::config::DEFAULT_TERMINATE_GRACE_MS),
        }
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    /// Append a handler after the built-in ones.
    pub fn push_handler(&mut self, handler: Box<dyn MessageHandler + Send>) {
        self.handlers.push(handler);
    }

    pub fn lifecycle(&self) -> UiLifecycleState {
        self.guard.lifecycle()
    }

    pub fn writer(&self) -> &Arc<WriteGuard> {
        &self.guard
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(ChildProcess::pid)
    }

    /// Handle at most one message.
    pub fn poll_once(&mut self, host: &mut dyn UiHost) -> PollStatus {
        self.step(host).status
    }

    pub(crate) fn step(&mut self, host: &mut dyn UiHost) -> Step {
        match self.guard.lifecycle().liveness {
            Liveness::Crashed => {
                return Step {
                    status: PollStatus::Crashed,
                    consumed: false,
                }
            }
            Liveness::Closed => return Step::idle(false),
            Liveness::NotStarted | Liveness::Running => {}
        }

        match self.source.next_message() {
            Incoming::Empty => {
                if self.source.is_settled() && !self.child_alive() {
                    return self.crash(host, "companion exited");
                }
                Step::idle(false)
            }
            Incoming::Closed => self.crash(host, "channel closed by peer"),
            Incoming::Dropped(err) => {
                log_debug(&format!("dropped malformed message: {err}"));
                Step::idle(true)
            }
            Incoming::Message(message) => {
                if !is_goodbye(&message) && !self.child_alive() {
                    return self.crash(host, "companion exited");
                }
                self.dispatch(&message, host)
            }
        }
    }

    fn dispatch(&mut self, message: &Message, host: &mut dyn UiHost) -> Step {
        log_debug_content(&format!("recv: {} {:?}", message.command, message.args));
        let changed = {
            let mut ctx = HandlerContext::new(&self.guard, &mut *host);
            let handled = self
                .handlers
                .iter_mut()
                .any(|handler| handler.handle(message, &mut ctx) == Handled::Yes);
            if !handled {
                log_debug(&format!("ignoring unhandled command {:?}", message.command));
            }
            ctx.changed()
        };
        if !changed {
            return Step::idle(true);
        }
        let state = self.guard.lifecycle();
        tracing::info!(
            liveness = ?state.liveness,
            visibility = ?state.visibility,
            "ui state changed"
        );
        host.lifecycle_changed(state);
        Step {
            status: PollStatus::StateChanged,
            consumed: true,
        }
    }

    fn child_alive(&mut self) -> bool {
        self.child.as_mut().map_or(true, ChildProcess::is_alive)
    }

    fn crash(&mut self, host: &mut dyn UiHost, reason: &str) -> Step {
        if self.guard.mark_crashed() {
            tracing::warn!(pid = ?self.pid(), reason, "companion crashed");
            host.lifecycle_changed(self.guard.lifecycle());
        }
        Step {
            status: PollStatus::Crashed,
            consumed: false,
        }
    }

    /// Stop the companion (quit, SIGTERM, SIGKILL) and close the channel.
    ///
    /// Returns how the companion went away on the first call only; later calls, and
    /// machines without a child, return `None`.
    pub fn terminate(&mut self) -> Option<TerminateOutcome> {
        let outcome = self
            .child
            .as_mut()
            .map(|child| child.request_terminate(Some(&*self.guard), self.terminate_grace))
            .filter(|outcome| *outcome != TerminateOutcome::AlreadyRequested);
        self.guard.mark_closed(false);
        outcome
    }
}

fn is_goodbye(message: &Message) -> bool {
    matches!(message.kind(), Some(Command::Quit | Command::Exiting))
}
