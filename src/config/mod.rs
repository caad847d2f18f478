//! Bridge tuning knobs, parsed with clap so binaries and hosts share one definition.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::channel::ChannelOptions;
pub use defaults::{
    DEFAULT_ARG_TIMEOUT_MS, DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_MAX_LINE_BYTES,
    DEFAULT_MAX_MESSAGES_PER_IDLE, DEFAULT_TERMINATE_GRACE_MS, DEFAULT_WRITE_TIMEOUT_MS,
};

/// Settings shared by the host side and the companion side of the bridge.
#[derive(Debug, Parser, Clone)]
#[command(about = "Pipe bridge to an out-of-process plugin UI", author, version)]
pub struct BridgeConfig {
    /// How the companion receives its pipe ends
    #[arg(
        long,
        value_enum,
        env = "UI_BRIDGE_TRANSPORT",
        default_value_t = Transport::InheritedFds
    )]
    pub transport: Transport,

    /// Time to wait for the companion's first (empty) line (milliseconds)
    #[arg(long = "handshake-timeout-ms", default_value_t = DEFAULT_HANDSHAKE_TIMEOUT_MS)]
    pub handshake_timeout_ms: u64,

    /// Time to wait for each argument line of a multi-line message (milliseconds)
    #[arg(long = "arg-timeout-ms", default_value_t = DEFAULT_ARG_TIMEOUT_MS)]
    pub arg_timeout_ms: u64,

    /// Give up on a write when the peer stops draining the pipe this long (milliseconds)
    #[arg(long = "write-timeout-ms", default_value_t = DEFAULT_WRITE_TIMEOUT_MS)]
    pub write_timeout_ms: u64,

    /// Wait between quit, SIGTERM and SIGKILL when stopping the companion (milliseconds)
    #[arg(long = "terminate-grace-ms", default_value_t = DEFAULT_TERMINATE_GRACE_MS)]
    pub terminate_grace_ms: u64,

    /// Largest unterminated input accepted before the channel is closed (bytes)
    #[arg(long = "max-line-bytes", default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,

    /// Messages handled per idle call before yielding back to the host
    #[arg(long = "max-messages-per-idle", default_value_t = DEFAULT_MAX_MESSAGES_PER_IDLE)]
    pub max_messages_per_idle: usize,

    /// Read from the companion on a background thread instead of the idle thread
    #[arg(long = "threaded-reader", env = "UI_BRIDGE_THREADED_READER", default_value_t = false)]
    pub threaded_reader: bool,

    /// Send `show` right after the handshake
    #[arg(long = "show-on-start", default_value_t = false)]
    pub show_on_start: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "UI_BRIDGE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "UI_BRIDGE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow protocol payloads in the debug log
    #[arg(
        long = "log-content",
        env = "UI_BRIDGE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,
}

/// How the two child pipe ends reach the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Inherit the raw descriptors and pass their numbers as the last two arguments.
    InheritedFds,
    /// Use the pipes as the companion's stdin and stdout.
    StdStreams,
}

impl Transport {
    pub fn label(self) -> &'static str {
        match self {
            Transport::InheritedFds => "inherited-fds",
            Transport::StdStreams => "std-streams",
        }
    }
}

impl Default for BridgeConfig {
    /// Built-in defaults, ignoring the command line and environment.
    fn default() -> Self {
        Self {
            transport: Transport::InheritedFds,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            arg_timeout_ms: DEFAULT_ARG_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_messages_per_idle: DEFAULT_MAX_MESSAGES_PER_IDLE,
            threaded_reader: false,
            show_on_start: false,
            logs: false,
            no_logs: false,
            log_content: false,
        }
    }
}

impl BridgeConfig {
    pub fn logging_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn arg_timeout(&self) -> Duration {
        Duration::from_millis(self.arg_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            max_line_bytes: self.max_line_bytes,
            write_timeout: self.write_timeout(),
        }
    }
}
