//! Companion process supervision: spawn over fresh pipes, wait for the handshake, probe
//! liveness and terminate with escalation.

mod child;
mod spawn;


use crate::channel::{ChannelOptions, LineReader, LineWriter};
use crate::config::BridgeConfig;
use crate::error::{ChannelError, SpawnError};
use crate::logging::snippet;
use std::time::{Duration, Instant};

pub use crate::config::Transport;
pub use child::{ChildProcess, TerminateOutcome};
pub use spawn::{PipeEndpoints, SpawnRequest};

const HANDSHAKE_POLL_SLICE: Duration = Duration::from_millis(50);

/// A started companion with the host ends of its pipes.
pub struct Connection {
    pub child: ChildProcess,
    pub reader: LineReader,
    pub writer: LineWriter,
}

/// Launches companions with one set of channel settings.
#[derive(Debug, Clone)]
pub struct Supervisor {
    handshake_timeout: Duration,
    channel: ChannelOptions,
}

impl Supervisor {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout(),
            channel: config.channel_options(),
        }
    }

    /// Spawn the companion and wait for its empty first line.
    ///
    /// Every failure is reported here; on failure the child has already been killed and
    /// reaped.
    pub fn launch(&self, request: &SpawnRequest) -> Result<Connection, SpawnError> {
        let endpoints = PipeEndpoints::create().map_err(SpawnError::Pipe)?;
        let (child, host_recv, host_send) = spawn::spawn_companion(request, endpoints)?;
        let mut child = ChildProcess::new(child);

        let ends = LineReader::new(host_recv, self.channel.max_line_bytes).and_then(|reader| {
            LineWriter::new(host_send, self.channel.write_timeout).map(|writer| (reader, writer))
        });
        let (mut reader, writer) = match ends {
            Ok(ends) => ends,
            Err(err) => {
                child.kill_now();
                return Err(err.into());
            }
        };

        if let Err(err) = await_handshake(&mut reader, &mut child, self.handshake_timeout) {
            tracing::warn!(program = %request.program.display(), error = %err, "companion start failed");
            child.kill_now();
            return Err(err);
        }

        tracing::info!(
            pid = child.pid(),
            program = %request.program.display(),
            transport = request.transport.label(),
            "companion started"
        );
        Ok(Connection {
            child,
            reader,
            writer,
        })
    }
}

fn await_handshake(
    reader: &mut LineReader,
    child: &mut ChildProcess,
    timeout: Duration,
) -> Result<(), SpawnError> {
    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(SpawnError::Handshake(format!(
                "no handshake within {} ms",
                timeout.as_millis()
            )));
        }
        match reader.read_line(Some(HANDSHAKE_POLL_SLICE.min(deadline - now))) {
            Ok(Some(line)) if line.is_empty() => return Ok(()),
            Ok(Some(line)) => {
                return Err(SpawnError::Handshake(format!(
                    "unexpected first line {:?}",
                    snippet(&line, 40)
                )))
            }
            Ok(None) => {
                if !child.is_alive() {
                    return Err(SpawnError::Handshake(exited_early(child)));
                }
            }
            Err(ChannelError::Closed) => {
                child.wait_for_exit(HANDSHAKE_POLL_SLICE);
                return Err(SpawnError::Handshake(exited_early(child)));
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn exited_early(child: &ChildProcess) -> String {
    match child.exit_status() {
        Some(status) => format!("companion exited before the handshake ({status})"),
        None => "companion closed its pipe before the handshake".to_string(),
    }
}
