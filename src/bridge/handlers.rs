use super::UiHost;
use crate::guard::WriteGuard;
use crate::protocol::{Command, Message};
use crate::state::{UiLifecycleState, Visibility};
use crate::{log_debug, log_debug_content};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Yes,
    No,
}

/// One link in the handler chain. The first handler returning [`Handled::Yes`] wins.
pub trait MessageHandler {
    fn handle(&mut self, message: &Message, ctx: &mut HandlerContext<'_>) -> Handled;
}

/// What a handler may touch while handling one message.
pub struct HandlerContext<'a> {
    guard: &'a WriteGuard,
    host: &'a mut dyn UiHost,
    changed: bool,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(guard: &'a WriteGuard, host: &'a mut dyn UiHost) -> Self {
        Self {
            guard,
            host,
            changed: false,
        }
    }

    pub fn lifecycle(&self) -> UiLifecycleState {
        self.guard.lifecycle()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle().is_running()
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.changed |= self
            .guard
            .update_lifecycle(|state| state.set_visibility(visibility));
    }

    /// The peer said goodbye: close the channel, optionally marking the UI hidden.
    pub fn close(&mut self, hide: bool) {
        self.changed |= self.guard.mark_closed(hide);
    }

    pub fn host(&mut self) -> &mut dyn UiHost {
        &mut *self.host
    }

    pub(crate) fn changed(&self) -> bool {
        self.changed
    }
}

/// Show, hide, goodbye and error reports.
#[derive(Debug, Default)]
pub struct LifecycleHandler;

impl MessageHandler for LifecycleHandler {
    fn handle(&mut self, message: &Message, ctx: &mut HandlerContext<'_>) -> Handled {
        match message.kind() {
            Some(Command::Show) => {
                if ctx.is_running() {
                    ctx.set_visibility(Visibility::Shown);
                }
            }
            Some(Command::Hide) => {
                if ctx.is_running() {
                    ctx.set_visibility(Visibility::Hidden);
                }
            }
            Some(Command::Exiting) => ctx.close(true),
            Some(Command::Quit) => ctx.close(false),
            Some(Command::Error) => {
                tracing::warn!("companion reported an error");
                log_debug_content(&format!(
                    "companion error: {}",
                    message.arg(0).unwrap_or_default()
                ));
            }
            _ => return Handled::No,
        }
        Handled::Yes
    }
}

/// Parameter and size reports, forwarded to the host once validated.
#[derive(Debug, Default)]
pub struct HostForwarder;

impl MessageHandler for HostForwarder {
    fn handle(&mut self, message: &Message, ctx: &mut HandlerContext<'_>) -> Handled {
        match message.kind() {
            Some(Command::Control) => {
                if !ctx.is_running() {
                    return Handled::Yes;
                }
                match (message.uint_arg(0), message.float_arg(1)) {
                    (Ok(index), Ok(value)) => ctx.host().parameter_changed(index, value),
                    (Err(err), _) | (_, Err(err)) => {
                        log_debug(&format!("dropping control message: {err}"));
                    }
                }
            }
            Some(Command::Size) => {
                if !ctx.is_running() {
                    return Handled::Yes;
                }
                match (message.uint_arg(0), message.uint_arg(1)) {
                    (Ok(width), Ok(height)) => ctx.host().size_changed(width, height),
                    (Err(err), _) | (_, Err(err)) => {
                        log_debug(&format!("dropping size message: {err}"));
                    }
                }
            }
            _ => return Handled::No,
        }
        Handled::Yes
    }
}

pub(crate) fn default_handlers() -> Vec<Box<dyn MessageHandler + Send>> {
    vec![Box::new(LifecycleHandler), Box::new(HostForwarder)]
}
