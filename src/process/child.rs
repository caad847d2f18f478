use crate::guard::WriteGuard;
use crate::log_debug;
use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// How a termination request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// A previous request already ran; nothing was done.
    AlreadyRequested,
    /// The companion had exited before the request.
    AlreadyExited,
    /// Exited after `quit`.
    Quit,
    /// Exited after SIGTERM.
    Terminated,
    /// Needed SIGKILL.
    Killed,
    /// Still not reaped after SIGKILL.
    Unresponsive,
}

/// The spawned companion. Exit status is cached once observed, so a reaped pid is never
/// signalled again.
pub struct ChildProcess {
    child: Child,
    exit_status: Option<ExitStatus>,
    terminate_requested: bool,
}

impl ChildProcess {
    pub(crate) fn new(child: Child) -> Self {
        Self {
            child,
            exit_status: None,
            terminate_requested: false,
        }
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Non-blocking liveness probe.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                log_debug(&format!("companion {} exited: {status}", self.pid()));
                self.exit_status = Some(status);
                false
            }
            Ok(None) => true,
            Err(err) => {
                log_debug(&format!("companion {} wait failed: {err}", self.pid()));
                false
            }
        }
    }

    /// Poll for exit until `timeout` passes. A zero timeout never waits.
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        if !self.is_alive() {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        let start = Instant::now();
        while start.elapsed() < timeout {
            thread::sleep(EXIT_POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed())));
            if !self.is_alive() {
                return true;
            }
        }
        false
    }

    /// Ask the companion to stop: `quit` over the pipe, then SIGTERM, then SIGKILL, waiting
    /// `grace` between steps. Only the first call does anything.
    pub fn request_terminate(&mut self, guard: Option<&WriteGuard>, grace: Duration) -> TerminateOutcome {
        if self.terminate_requested {
            return TerminateOutcome::AlreadyRequested;
        }
        self.terminate_requested = true;
        let pid = self.pid();

        if !self.is_alive() {
            return TerminateOutcome::AlreadyExited;
        }
        if let Some(guard) = guard.filter(|guard| guard.is_writable()) {
            if let Err(err) = guard.write_quit() {
                log_debug(&format!("companion {pid}: quit not delivered: {err}"));
            }
        }
        if self.wait_for_exit(grace) {
            tracing::info!(pid, "companion exited after quit");
            return TerminateOutcome::Quit;
        }

        self.signal(libc::SIGTERM, "SIGTERM");
        if self.wait_for_exit(grace) {
            tracing::info!(pid, "companion exited after SIGTERM");
            return TerminateOutcome::Terminated;
        }

        self.signal(libc::SIGKILL, "SIGKILL");
        if self.wait_for_exit(KILL_REAP_TIMEOUT) {
            tracing::warn!(pid, "companion killed");
            TerminateOutcome::Killed
        } else {
            tracing::error!(pid, "companion still running after SIGKILL");
            TerminateOutcome::Unresponsive
        }
    }

    /// SIGKILL and reap without the polite steps; used when start-up fails.
    pub(crate) fn kill_now(&mut self) {
        self.terminate_requested = true;
        if !self.is_alive() {
            return;
        }
        self.signal(libc::SIGKILL, "SIGKILL");
        if !self.wait_for_exit(KILL_REAP_TIMEOUT) {
            log_debug(&format!("companion {} not reaped after SIGKILL", self.pid()));
        }
    }

    fn signal(&self, signal: libc::c_int, label: &str) {
        let Ok(pid) = libc::pid_t::try_from(self.pid()) else {
            return;
        };
        // SAFETY: pid belongs to our unreaped child (exit_status is still None), so it cannot
        // have been recycled for another process.
        if unsafe { libc::kill(pid, signal) } != 0 {
            log_debug(&format!(
                "{label} to companion {pid} failed: {}",
                io::Error::last_os_error()
            ));
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.is_alive() {
            log_debug(&format!(
                "companion {} dropped while running, killing",
                self.pid()
            ));
            self.kill_now();
        }
    }
}
