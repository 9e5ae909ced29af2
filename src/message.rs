//! IRC message parsing
//!
//! Turns one raw protocol line into a structured [`IrcMessage`] and back.
//! Only the parts the session layer needs are modelled: an optional IRCv3
//! tag block, the prefix, the command and its ordered arguments.

use std::fmt;

/// Errors produced while parsing a raw line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("missing command in line: {0}")]
    MissingCommand(String),
}

/// A parsed IRC protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// Raw IRCv3 tag block without the leading `@`
    pub tags: Option<String>,
    /// Message source without the leading `:`, e.g. `nick!user@host`
    pub prefix: Option<String>,
    pub command: String,
    /// Middle params followed by the trailing param, if any
    pub args: Vec<String>,
}

impl IrcMessage {
    /// Build a message with no tags or prefix
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            tags: None,
            prefix: None,
            command: command.into(),
            args,
        }
    }

    /// Parse a single line (without its CRLF terminator)
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if rest.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut tags = None;
        if let Some(stripped) = rest.strip_prefix('@') {
            let (t, r) = split_word(stripped);
            tags = Some(t.to_string());
            rest = r;
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, r) = split_word(stripped);
            prefix = Some(p.to_string());
            rest = r;
        }

        let (command, mut rest) = split_word(rest);
        if command.is_empty() {
            return Err(ParseError::MissingCommand(line.to_string()));
        }

        let mut args = Vec::new();
        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                args.push(trailing.to_string());
                break;
            }
            let (arg, r) = split_word(rest);
            args.push(arg.to_string());
            rest = r;
        }

        Ok(Self {
            tags,
            prefix,
            command: command.to_string(),
            args,
        })
    }

    /// Nickname portion of the prefix, i.e. the user who performed the action
    pub fn target_user(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split(['!', '@']).next().unwrap_or(p))
    }

    /// Whether the command matches `name` case-insensitively
    pub fn is_command(&self, name: &str) -> bool {
        self.command.eq_ignore_ascii_case(name)
    }

    /// Numeric reply code, if the command is a three digit numeric
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

/// Split off the first space-delimited word, skipping repeated spaces
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((word, rest)) => (word, rest.trim_start_matches(' ')),
        None => (s, ""),
    }
}

impl fmt::Display for IrcMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            write!(f, "@{} ", tags)?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middle)) = self.args.split_last() {
            for arg in middle {
                write!(f, " {}", arg)?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix_command_and_trailing() {
        let msg = IrcMessage::parse(":alice!a@host PRIVMSG #rust :hello there").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!a@host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.args, vec!["#rust", "hello there"]);
        assert_eq!(msg.target_user(), Some("alice"));
    }

    #[test]
    fn test_parse_without_prefix() {
        let msg = IrcMessage::parse("PING :abc").unwrap();
        assert!(msg.prefix.is_none());
        assert!(msg.is_command("ping"));
        assert_eq!(msg.last_arg(), Some("abc"));
        assert_eq!(msg.target_user(), None);
    }

    #[test]
    fn test_parse_tags_and_numeric() {
        let msg =
            IrcMessage::parse("@time=2024-01-01T00:00:00Z :irc.example 376 me :End of /MOTD")
                .unwrap();
        assert_eq!(msg.tags.as_deref(), Some("time=2024-01-01T00:00:00Z"));
        assert_eq!(msg.numeric(), Some(376));
        assert_eq!(msg.first_arg(), Some("me"));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(IrcMessage::parse(""), Err(ParseError::Empty));
        assert_eq!(IrcMessage::parse("   "), Err(ParseError::Empty));
        assert!(matches!(
            IrcMessage::parse(":only.prefix"),
            Err(ParseError::MissingCommand(_))
        ));
    }

    #[test]
    fn test_target_user_server_prefix() {
        let msg = IrcMessage::parse(":irc.example.net NOTICE * :hi").unwrap();
        assert_eq!(msg.target_user(), Some("irc.example.net"));
    }

    #[test]
    fn test_display_restores_wire_form() {
        let line = ":bob!b@h JOIN #rust";
        assert_eq!(IrcMessage::parse(line).unwrap().to_string(), line);

        let line = ":srv 001 me :Welcome to the network";
        assert_eq!(IrcMessage::parse(line).unwrap().to_string(), line);

        let msg = IrcMessage::new("AWAY", vec![]);
        assert_eq!(msg.to_string(), "AWAY");
    }
}
