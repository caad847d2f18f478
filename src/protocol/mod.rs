//! Wire vocabulary and codec.
//!
//! A message is a command line followed by a fixed number of argument lines. Arguments
//! are sanitized so they never contain the terminator.

mod codec;
mod command;


use crate::error::ProtocolError;

pub use codec::{
    decode_message, encode, encode_block, format_float, normalize, parse_float, parse_uint,
    restore, sanitize,
};
pub use command::{arity_of, Command};

/// A decoded message. `command` keeps the raw token so unknown commands can be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: String,
    pub args: Vec<String>,
}

impl Message {
    pub fn new(command: Command, args: Vec<String>) -> Self {
        Self {
            command: command.token().to_string(),
            args,
        }
    }

    pub fn kind(&self) -> Option<Command> {
        Command::from_token(&self.command)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn uint_arg(&self, index: usize) -> Result<u32, ProtocolError> {
        let raw = self.required_arg(index)?;
        parse_uint(raw).ok_or_else(|| self.invalid(index, raw))
    }

    pub fn float_arg(&self, index: usize) -> Result<f32, ProtocolError> {
        let raw = self.required_arg(index)?;
        parse_float(raw).ok_or_else(|| self.invalid(index, raw))
    }

    fn required_arg(&self, index: usize) -> Result<&str, ProtocolError> {
        self.arg(index).ok_or_else(|| ProtocolError::MissingArgument {
            command: self.command.clone(),
            index,
        })
    }

    fn invalid(&self, index: usize, raw: &str) -> ProtocolError {
        ProtocolError::InvalidArgument {
            command: self.command.clone(),
            index,
            value: raw.to_string(),
        }
    }
}
