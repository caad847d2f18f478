//! Companion side of the bridge.
//!
//! A companion is started with its pipe ends either as the two trailing arguments or as
//! stdin/stdout. [`PipeClient`] attaches to them, sends the handshake line and then
//! exchanges the same messages as the host.

use crate::channel::fd::{dup_cloexec, is_open_fd, set_cloexec};
use crate::channel::{LineReader, LineWriter};
use crate::config::BridgeConfig;
use crate::error::{ChannelError, ConnectError};
use crate::guard::WriteGuard;
use crate::log_debug;
use crate::protocol::{decode_message, restore, Message};
use crate::state::UiLifecycleState;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

pub struct PipeClient {
    reader: LineReader,
    guard: Arc<WriteGuard>,
    arg_timeout: Duration,
    max_messages: usize,
}

fn parse_descriptor(raw: &str) -> Result<RawFd, ConnectError> {
    match raw.parse::<RawFd>() {
        Ok(fd) if fd > 2 && is_open_fd(fd) => Ok(fd),
        _ => Err(ConnectError::InvalidDescriptor(raw.to_string())),
    }
}

impl PipeClient {
    /// Attach to the descriptors passed as the last two arguments (`read-fd write-fd`).
    pub fn from_fd_args(args: &[String], config: &BridgeConfig) -> Result<Self, ConnectError> {
        let [recv, send] = match args {
            [.., recv, send] => [recv, send],
            _ => return Err(ConnectError::MissingDescriptors),
        };
        let recv = parse_descriptor(recv)?;
        let send = parse_descriptor(send)?;
        if recv == send {
            return Err(ConnectError::InvalidDescriptor(send.to_string()));
        }
        set_cloexec(recv, true).map_err(ChannelError::from)?;
        set_cloexec(send, true).map_err(ChannelError::from)?;
        // SAFETY: both descriptors were inherited for this purpose, are open, and are
        // owned by nothing else in this process.
        let (recv, send) = unsafe { (OwnedFd::from_raw_fd(recv), OwnedFd::from_raw_fd(send)) };
        Self::connect(recv, send, config)
    }

    /// Attach to stdin/stdout. Stdout is pointed at stderr afterwards so stray prints
    /// cannot corrupt the framing.
    pub fn from_stdio(config: &BridgeConfig) -> Result<Self, ConnectError> {
        let recv = dup_cloexec(libc::STDIN_FILENO).map_err(ChannelError::from)?;
        let send = dup_cloexec(libc::STDOUT_FILENO).map_err(ChannelError::from)?;
        // SAFETY: dup2 on the standard descriptors; stdout keeps a valid target.
        if unsafe { libc::dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO) } < 0 {
            log_debug("client: could not redirect stdout to stderr");
        }
        Self::connect(recv, send, config)
    }

    pub(crate) fn connect(
        recv: OwnedFd,
        send: OwnedFd,
        config: &BridgeConfig,
    ) -> Result<Self, ConnectError> {
        let options = config.channel_options();
        let reader = LineReader::new(recv, options.max_line_bytes)?;
        let writer = LineWriter::new(send, options.write_timeout)?;
        let guard = Arc::new(WriteGuard::new(writer, UiLifecycleState::running()));
        let mut pending = guard.acquire();
        pending.push_line("")?;
        pending.flush_and_release()?;
        Ok(Self {
            reader,
            guard,
            arg_timeout: config.arg_timeout(),
            max_messages: config.max_messages_per_idle,
        })
    }

    pub fn is_running(&self) -> bool {
        self.reader.is_open() && !self.guard.lifecycle().is_terminal()
    }

    /// Hand every available message to `on_message` without blocking on the first line.
    /// Returns false once the host is gone.
    pub fn idle(&mut self, mut on_message: impl FnMut(&Message)) -> bool {
        for _ in 0..self.max_messages {
            let line = match self.reader.read_line(None) {
                Ok(Some(line)) => line,
                Ok(None) => return true,
                Err(_) => return self.host_gone(),
            };
            match decode_message(line, &mut self.reader, self.arg_timeout) {
                Ok(message) => on_message(&message),
                Err(err) if err.is_fatal() => return self.host_gone(),
                Err(err) => log_debug(&format!("client: dropped message: {err}")),
            }
        }
        self.is_running()
    }

    /// Wait up to `timeout` for one raw line, with escaped terminators restored.
    pub fn read_line_block(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError> {
        Ok(self
            .reader
            .read_line(Some(timeout))?
            .map(|line| restore(&line).into_owned()))
    }

    /// The shared writer; hold [`WriteGuard::acquire`] across multi-line sends.
    pub fn writer(&self) -> &Arc<WriteGuard> {
        &self.guard
    }

    pub fn close(&mut self) {
        self.reader.close();
        self.guard.mark_closed(false);
    }

    fn host_gone(&mut self) -> bool {
        log_debug("client: host closed the channel");
        self.reader.close();
        self.guard.mark_crashed();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::fd::pipe_cloexec;
    use crate::protocol::Command;
    use std::fs::File;
    use std::io::Write;
    use std::os::fd::IntoRawFd;

    struct HostEnds {
        to_client: File,
        from_client: LineReader,
    }

    fn connected_client() -> (PipeClient, HostEnds) {
        let (client_recv, host_send) = pipe_cloexec().unwrap();
        let (host_recv, client_send) = pipe_cloexec().unwrap();
        let client = PipeClient::connect(client_recv, client_send, &BridgeConfig::default()).unwrap();
        let host = HostEnds {
            to_client: File::from(host_send),
            from_client: LineReader::new(host_recv, 4096).unwrap(),
        };
        (client, host)
    }

    #[test]
    fn connect_sends_empty_handshake_line() {
        let (_client, mut host) = connected_client();
        let line = host
            .from_client
            .read_line(Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(line.as_deref(), Some(""));
    }

    #[test]
    fn idle_delivers_decoded_messages() {
        let (mut client, mut host) = connected_client();
        host.to_client
            .write_all(b"control\n2\n0.75\nconfigure\ntitle\nA\rB\nshow\n")
            .unwrap();

        let mut seen = Vec::new();
        assert!(client.idle(|message| seen.push(message.clone())));
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].kind(), Some(Command::Control));
        assert_eq!(seen[0].float_arg(1).unwrap(), 0.75);
        assert_eq!(seen[1].arg(1), Some("A\nB"));
        assert_eq!(seen[2].kind(), Some(Command::Show));
    }

    #[test]
    fn idle_reports_host_gone() {
        let (mut client, host) = connected_client();
        drop(host);
        assert!(!client.idle(|_| panic!("no messages expected")));
        assert!(!client.is_running());
        assert!(client.writer().write_show().unwrap_err().is_closed());
    }

    #[test]
    fn read_line_block_restores_payload() {
        let (mut client, mut host) = connected_client();
        host.to_client.write_all(b"two\rlines\n").unwrap();
        let line = client.read_line_block(Duration::from_secs(1)).unwrap();
        assert_eq!(line.as_deref(), Some("two\nlines"));
    }

    #[test]
    fn from_fd_args_requires_two_trailing_descriptors() {
        let config = BridgeConfig::default();
        assert!(matches!(
            PipeClient::from_fd_args(&["only-one".to_string()], &config),
            Err(ConnectError::MissingDescriptors)
        ));
        assert!(matches!(
            PipeClient::from_fd_args(&["abc".to_string(), "4".to_string()], &config),
            Err(ConnectError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            PipeClient::from_fd_args(&["1".to_string(), "2".to_string()], &config),
            Err(ConnectError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            PipeClient::from_fd_args(&["100000".to_string(), "100001".to_string()], &config),
            Err(ConnectError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn from_fd_args_attaches_to_inherited_descriptors() {
        let (client_recv, host_send) = pipe_cloexec().unwrap();
        let (host_recv, client_send) = pipe_cloexec().unwrap();
        let args = vec![
            "urn:example".to_string(),
            client_recv.into_raw_fd().to_string(),
            client_send.into_raw_fd().to_string(),
        ];
        let mut client = PipeClient::from_fd_args(&args, &BridgeConfig::default()).unwrap();
        let mut from_client = LineReader::new(host_recv, 4096).unwrap();
        assert_eq!(
            from_client
                .read_line(Some(Duration::from_secs(1)))
                .unwrap()
                .as_deref(),
            Some("")
        );

        client.writer().write_size(640, 480).unwrap();
        let mut to_client = File::from(host_send);
        to_client.write_all(b"hide\n").unwrap();
        let mut seen = Vec::new();
        client.idle(|message| seen.push(message.command.clone()));
        assert_eq!(seen, vec!["hide"]);
        assert_eq!(
            from_client
                .read_line(Some(Duration::from_secs(1)))
                .unwrap()
                .as_deref(),
            Some("size")
        );
    }
}
