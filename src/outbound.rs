//! One writer per outgoing command, all going through [`WriteGuard::send`].

use crate::error::ChannelError;
use crate::guard::WriteGuard;
use crate::protocol::{format_float, Command};

/// A MIDI note event with its ranges already checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiNote {
    channel: u8,
    note: u8,
    velocity: u8,
}

impl MidiNote {
    pub fn new(channel: u8, note: u8, velocity: u8) -> Option<Self> {
        (channel < 16 && note < 128 && velocity < 128).then_some(Self {
            channel,
            note,
            velocity,
        })
    }
}

impl WriteGuard {
    pub fn write_show(&self) -> Result<(), ChannelError> {
        self.send(Command::Show, &[])
    }

    pub fn write_hide(&self) -> Result<(), ChannelError> {
        self.send(Command::Hide, &[])
    }

    pub fn write_focus(&self) -> Result<(), ChannelError> {
        self.send(Command::Focus, &[])
    }

    /// Ask the peer to shut down. The channel is closed for writing afterwards.
    pub fn write_quit(&self) -> Result<(), ChannelError> {
        self.send(Command::Quit, &[])
    }

    /// Companion-side goodbye: the host hides the UI and closes the channel.
    pub fn write_exiting(&self) -> Result<(), ChannelError> {
        self.send(Command::Exiting, &[])
    }

    pub fn write_control(&self, index: u32, value: f32) -> Result<(), ChannelError> {
        self.send(
            Command::Control,
            &[&index.to_string(), &format_float(value)],
        )
    }

    pub fn write_size(&self, width: u32, height: u32) -> Result<(), ChannelError> {
        self.send(Command::Size, &[&width.to_string(), &height.to_string()])
    }

    pub fn write_program(&self, index: u32) -> Result<(), ChannelError> {
        self.send(Command::Program, &[&index.to_string()])
    }

    pub fn write_midi_program(&self, bank: u32, program: u32) -> Result<(), ChannelError> {
        self.send(
            Command::MidiProgram,
            &[&bank.to_string(), &program.to_string()],
        )
    }

    pub fn write_note(&self, on: bool, note: MidiNote) -> Result<(), ChannelError> {
        self.send(
            Command::Note,
            &[
                if on { "true" } else { "false" },
                &note.channel.to_string(),
                &note.note.to_string(),
                &note.velocity.to_string(),
            ],
        )
    }

    pub fn write_configure(&self, key: &str, value: &str) -> Result<(), ChannelError> {
        self.send(Command::Configure, &[key, value])
    }

    pub fn write_error(&self, message: &str) -> Result<(), ChannelError> {
        self.send(Command::Error, &[message])
    }
}
