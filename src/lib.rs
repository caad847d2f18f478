//! Out-of-process plugin UI bridge.
//!
//! A host-side [`bridge::ExternalUi`] spawns a companion process, talks to it over a pair
//! of pipes with a newline-framed text protocol, and turns what it hears into host
//! callbacks from a non-blocking idle call. [`client::PipeClient`] is the companion side.

pub mod bridge;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod host;
mod lock;
pub mod logging;
mod outbound;
pub mod process;
pub mod protocol;
pub mod state;
mod telemetry;

pub use bridge::{ExternalUi, IdleStatus, PollStatus, ProtocolStateMachine, UiEvent, UiHost};
pub use client::PipeClient;
pub use config::{BridgeConfig, Transport};
pub use error::{ChannelError, ConnectError, ProtocolError, SpawnError};
pub use guard::{PendingWrite, WriteGuard};
pub use logging::{init_logging, log_debug, log_debug_content, log_file_path, log_panic};
pub use outbound::MidiNote;
pub use state::{Liveness, UiLifecycleState, Visibility};
pub use telemetry::init_tracing;
