use crate::voice::VoiceListing;
use std::fmt;

pub const HELP_TEXT: &str = "Available commands:
  /help           - Show this help
  /voices         - List available voices
  /voice <name>   - Change voice (e.g. /voice Emma)
  /clear          - Clear conversation history
  /quit           - Leave the chat";

/// In-band commands typed in place of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Voices,
    Voice(Option<String>),
    Clear,
    Quit,
    Unknown(String),
}

impl Command {
    /// `None` when the line is an ordinary message (does not start with `/`).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }
        let mut parts = line.split_whitespace();
        let word = parts.next().unwrap_or("/").to_lowercase();
        let cmd = match word.as_str() {
            "/help" => Command::Help,
            "/voices" => Command::Voices,
            "/voice" => Command::Voice(parts.next().map(str::to_string)),
            "/clear" => Command::Clear,
            "/quit" => Command::Quit,
            _ => Command::Unknown(word),
        };
        Some(cmd)
    }
}

/// What the run loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Terminate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Help,
    Voices(VoiceListing),
    VoiceChanged(String),
    VoiceRejected(String),
    VoiceUsage,
    Cleared,
    Quit,
    Unknown(String),
}

impl CommandReply {
    pub fn control(&self) -> Control {
        match self {
            CommandReply::Quit => Control::Terminate,
            _ => Control::Continue,
        }
    }
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandReply::Help => f.write_str(HELP_TEXT),
            CommandReply::Voices(listing) => {
                if listing.values().all(|b| b.is_empty()) {
                    return f.write_str("No voices available");
                }
                write!(f, "Available voices:")?;
                for (language, buckets) in listing {
                    write!(f, "\n{}:", language.as_str().to_uppercase())?;
                    if !buckets.male.is_empty() {
                        write!(f, "\n  Male: {}", buckets.male.join(", "))?;
                    }
                    if !buckets.female.is_empty() {
                        write!(f, "\n  Female: {}", buckets.female.join(", "))?;
                    }
                }
                Ok(())
            }
            CommandReply::VoiceChanged(name) => write!(f, "Voice changed to: {name}"),
            CommandReply::VoiceRejected(name) => write!(
                f,
                "Voice '{name}' not found\nUse /voices to see the available voices"
            ),
            CommandReply::VoiceUsage => f.write_str("Usage: /voice <voice_name>"),
            CommandReply::Cleared => f.write_str("Conversation history cleared"),
            CommandReply::Quit => f.write_str("Goodbye!"),
            CommandReply::Unknown(cmd) => write!(
                f,
                "Unknown command: {cmd}\nUse /help to see the available commands"
            ),
        }
    }
}
