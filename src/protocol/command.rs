/// Every command either side may send.
///
/// The arity is fixed per command: a message is the command line followed by exactly that
/// many argument lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Show,
    Hide,
    Focus,
    Quit,
    Exiting,
    Control,
    Size,
    Program,
    MidiProgram,
    Note,
    Configure,
    Error,
}

impl Command {
    pub const ALL: [Command; 12] = [
        Command::Show,
        Command::Hide,
        Command::Focus,
        Command::Quit,
        Command::Exiting,
        Command::Control,
        Command::Size,
        Command::Program,
        Command::MidiProgram,
        Command::Note,
        Command::Configure,
        Command::Error,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Command::Show => "show",
            Command::Hide => "hide",
            Command::Focus => "focus",
            Command::Quit => "quit",
            Command::Exiting => "exiting",
            Command::Control => "control",
            Command::Size => "size",
            Command::Program => "program",
            Command::MidiProgram => "midiprogram",
            Command::Note => "note",
            Command::Configure => "configure",
            Command::Error => "error",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.token() == token)
    }

    pub fn arity(self) -> usize {
        match self {
            Command::Show | Command::Hide | Command::Focus | Command::Quit | Command::Exiting => 0,
            Command::Program | Command::Error => 1,
            Command::Control | Command::Size | Command::MidiProgram | Command::Configure => 2,
            Command::Note => 4,
        }
    }
}

/// Arity of a raw command token; unknown tokens carry no arguments.
pub fn arity_of(token: &str) -> usize {
    Command::from_token(token).map_or(0, Command::arity)
}
