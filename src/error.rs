use std::io;
use std::path::PathBuf;

/// Failure on a pipe endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("timed out waiting for the peer")]
    Timeout,
    #[error("channel closed")]
    Closed,
    #[error("line contains an embedded terminator")]
    EmbeddedTerminator,
    #[error("pipe setup failed: {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    pub fn is_closed(&self) -> bool {
        matches!(self, ChannelError::Closed)
    }
}

/// Failure while decoding a message. The message is dropped; the connection survives
/// unless the inner channel error says otherwise.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("`{command}` is missing argument {index}")]
    MissingArgument { command: String, index: usize },
    #[error("`{command}` argument {index} is not valid: {value:?}")]
    InvalidArgument {
        command: String,
        index: usize,
        value: String,
    },
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl ProtocolError {
    /// True when the channel itself failed, as opposed to a single bad message.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Channel(_))
    }
}

/// Failure to bring the companion up. Always reported synchronously by the launch call.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("invalid companion command: {0}")]
    InvalidCommand(String),
    #[error("failed to create pipes: {0}")]
    Pipe(#[source] io::Error),
    #[error("failed to launch {}: {source}", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to start the reader thread: {0}")]
    ReaderThread(#[source] io::Error),
    #[error("companion handshake failed: {0}")]
    Handshake(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Failure to attach the companion side to the pipes it was handed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("expected two pipe descriptors as the last arguments")]
    MissingDescriptors,
    #[error("invalid pipe descriptor {0:?}")]
    InvalidDescriptor(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
