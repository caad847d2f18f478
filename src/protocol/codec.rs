use super::command::arity_of;
use super::Message;
use crate::channel::{LineSource, LINE_TERMINATOR};
use crate::error::ProtocolError;
use std::borrow::Cow;
use std::time::Duration;

const ESCAPED_TERMINATOR: char = '\r';

fn is_dropped_control(ch: char) -> bool {
    ch.is_control() && ch != '\n' && ch != '\t' && ch != ESCAPED_TERMINATOR
}

/// Make a payload safe to put on one line.
///
/// `\n` becomes `\r` (which [`restore`] turns back into `\n`) and every other control
/// character except tab is dropped.
pub fn sanitize(value: &str) -> Cow<'_, str> {
    let needs_work = value
        .chars()
        .any(|ch| ch == LINE_TERMINATOR as char || is_dropped_control(ch));
    if !needs_work {
        return Cow::Borrowed(value);
    }
    let cleaned = value
        .chars()
        .filter(|ch| !is_dropped_control(*ch))
        .map(|ch| {
            if ch == LINE_TERMINATOR as char {
                ESCAPED_TERMINATOR
            } else {
                ch
            }
        })
        .collect();
    Cow::Owned(cleaned)
}

/// Undo the terminator escape applied by [`sanitize`].
pub fn restore(line: &str) -> Cow<'_, str> {
    if line.contains(ESCAPED_TERMINATOR) {
        Cow::Owned(line.replace(ESCAPED_TERMINATOR, "\n"))
    } else {
        Cow::Borrowed(line)
    }
}

/// What a payload looks like after a trip through [`sanitize`] and [`restore`]:
/// `\r` reads back as `\n` and dropped control characters are gone.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !is_dropped_control(*ch))
        .map(|ch| if ch == ESCAPED_TERMINATOR { '\n' } else { ch })
        .collect()
}

/// One line for the command and one sanitized line per argument, without terminators.
pub fn encode(command: &str, args: &[&str]) -> Vec<String> {
    let mut lines = Vec::with_capacity(args.len() + 1);
    lines.push(sanitize(command).into_owned());
    lines.extend(args.iter().map(|arg| sanitize(arg).into_owned()));
    lines
}

/// Same as [`encode`], framed and concatenated into one block ready for a single write.
pub fn encode_block(command: &str, args: &[&str]) -> Vec<u8> {
    let mut block = Vec::new();
    for line in encode(command, args) {
        block.extend_from_slice(line.as_bytes());
        block.push(LINE_TERMINATOR);
    }
    block
}

pub fn parse_uint(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.starts_with('-') {
        return None;
    }
    text.parse().ok()
}

pub fn parse_float(text: &str) -> Option<f32> {
    text.trim().parse::<f32>().ok().filter(|value| value.is_finite())
}

/// Shortest text that parses back to the same `f32`, independent of locale.
pub fn format_float(value: f32) -> String {
    format!("{value}")
}

/// Read the argument lines of a message whose command line was `first_line`.
///
/// Each argument gets `arg_timeout`; a missing one drops the message but keeps the channel.
pub fn decode_message<S: LineSource + ?Sized>(
    first_line: String,
    source: &mut S,
    arg_timeout: Duration,
) -> Result<Message, ProtocolError> {
    let arity = arity_of(&first_line);
    let mut args = Vec::with_capacity(arity);
    for index in 0..arity {
        match source.next_line(Some(arg_timeout))? {
            Some(line) => args.push(restore(&line).into_owned()),
            None => {
                return Err(ProtocolError::MissingArgument {
                    command: first_line,
                    index,
                })
            }
        }
    }
    Ok(Message {
        command: first_line,
        args,
    })
}
