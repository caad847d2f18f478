use crate::channel::fd::{above_stdio, pipe_cloexec, set_cloexec};
use crate::config::Transport;
use crate::error::SpawnError;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// The two pipes between host and companion. Every end starts close-on-exec and is
/// numbered above the standard streams.
pub struct PipeEndpoints {
    pub(crate) host_recv: OwnedFd,
    pub(crate) host_send: OwnedFd,
    pub(crate) child_recv: OwnedFd,
    pub(crate) child_send: OwnedFd,
}

impl PipeEndpoints {
    pub fn create() -> io::Result<Self> {
        let (host_recv, child_send) = pipe_cloexec()?;
        let (host_recv, child_send) = (above_stdio(host_recv)?, above_stdio(child_send)?);
        let (child_recv, host_send) = pipe_cloexec()?;
        let (child_recv, host_send) = (above_stdio(child_recv)?, above_stdio(host_send)?);
        Ok(Self {
            host_recv,
            host_send,
            child_recv,
            child_send,
        })
    }

    #[cfg(test)]
    pub(crate) fn raw_fds(&self) -> [RawFd; 4] {
        [
            self.host_recv.as_raw_fd(),
            self.host_send.as_raw_fd(),
            self.child_recv.as_raw_fd(),
            self.child_send.as_raw_fd(),
        ]
    }
}

/// What to run as the companion.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub transport: Transport,
}

impl SpawnRequest {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            transport: Transport::InheritedFds,
        }
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    fn validate(&self) -> Result<(), SpawnError> {
        if self.program.as_os_str().is_empty() {
            return Err(SpawnError::InvalidCommand("empty program path".to_string()));
        }
        if let Some(arg) = self.args.iter().find(|arg| arg.contains('\0')) {
            return Err(SpawnError::InvalidCommand(format!(
                "argument contains a NUL byte: {arg:?}"
            )));
        }
        Ok(())
    }
}

/// Arguments after the program name. Inherited descriptors go last: `read-fd write-fd`.
pub(crate) fn companion_argv(
    args: &[String],
    transport: Transport,
    child_recv: RawFd,
    child_send: RawFd,
) -> Vec<String> {
    let mut argv = args.to_vec();
    if transport == Transport::InheritedFds {
        argv.push(child_recv.to_string());
        argv.push(child_send.to_string());
    }
    argv
}

/// Start the companion and hand it its pipe ends. The child ends are closed in this
/// process before returning, so the host sees EOF as soon as the companion goes away.
pub(crate) fn spawn_companion(
    request: &SpawnRequest,
    endpoints: PipeEndpoints,
) -> Result<(Child, OwnedFd, OwnedFd), SpawnError> {
    request.validate()?;
    let PipeEndpoints {
        host_recv,
        host_send,
        child_recv,
        child_send,
    } = endpoints;

    let recv_raw = child_recv.as_raw_fd();
    let send_raw = child_send.as_raw_fd();
    let mut command = Command::new(&request.program);
    command.args(companion_argv(
        &request.args,
        request.transport,
        recv_raw,
        send_raw,
    ));

    let child = match request.transport {
        Transport::InheritedFds => {
            command.stdin(Stdio::null());
            // SAFETY: the hook runs between fork and exec and only calls fcntl, which is
            // async-signal-safe; both descriptors stay open in the parent until spawn returns.
            unsafe {
                command.pre_exec(move || {
                    set_cloexec(recv_raw, false)?;
                    set_cloexec(send_raw, false)?;
                    Ok(())
                });
            }
            let spawned = command.spawn();
            drop(child_recv);
            drop(child_send);
            spawned
        }
        Transport::StdStreams => command
            .stdin(Stdio::from(child_recv))
            .stdout(Stdio::from(child_send))
            .spawn(),
    }
    .map_err(|source| SpawnError::Launch {
        program: request.program.clone(),
        source,
    })?;

    Ok((child, host_recv, host_send))
}
