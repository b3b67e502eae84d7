//! IRC line parsing and serialization.
//!
//! Handles the `[@tags] [:prefix] COMMAND params... [:trailing]` shape of a
//! single protocol line. Tag values are kept unescaped as received.

use std::collections::HashMap;
use std::fmt;

/// A single parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// IRCv3 message tags (empty if none).
    pub tags: HashMap<String, String>,
    /// Source of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command or three-digit numeric, uppercased.
    pub command: String,
    /// Parameters, with the trailing parameter (if any) last.
    pub params: Vec<String>,
}

impl Message {
    /// Build an outgoing message with no tags or prefix.
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            tags: HashMap::new(),
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    /// Parse one line. Returns `None` for blank lines or lines without a command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, after) = stripped.split_once(' ')?;
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                match tag.split_once('=') {
                    Some((k, v)) => tags.insert(k.to_string(), v.to_string()),
                    None => tags.insert(tag.to_string(), String::new()),
                };
            }
            rest = after.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, after) = stripped.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = after.trim_start_matches(' ');
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, after)) => (c, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((p, after)) => {
                    params.push(p.to_string());
                    rest = after;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nickname part of the prefix, if the prefix is a user mask or bare nick.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .filter(|n| !n.is_empty())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut tags: Vec<_> = self.tags.iter().collect();
            tags.sort();
            let joined: Vec<String> = tags
                .into_iter()
                .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{k}={v}") })
                .collect();
            write!(f, "@{} ", joined.join(";"))?;
        }
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for p in middle {
                write!(f, " {p}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_privmsg_with_prefix() {
        let msg = Message::parse(":alice!a@host PRIVMSG #carrots :.carrot\r\n").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!a@host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#carrots", ".carrot"]);
        assert_eq!(msg.source_nick(), Some("alice"));
    }

    #[test]
    fn parse_tags_and_numeric() {
        let msg = Message::parse("@time=2024-01-01T00:00:00Z;+flag :irc.example 001 bot :Welcome").unwrap();
        assert_eq!(msg.tags.get("time").map(String::as_str), Some("2024-01-01T00:00:00Z"));
        assert_eq!(msg.tags.get("+flag").map(String::as_str), Some(""));
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["bot", "Welcome"]);
    }

    #[test]
    fn parse_without_prefix_or_trailing() {
        let msg = Message::parse("PING irc.example").unwrap();
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["irc.example"]);
    }

    #[test]
    fn trailing_keeps_inner_colons_and_spaces() {
        let msg = Message::parse(":bob PRIVMSG #c :ratio 1:2  ok").unwrap();
        assert_eq!(msg.params[1], "ratio 1:2  ok");
    }

    #[test]
    fn blank_line_is_rejected() {
        assert!(Message::parse("\r\n").is_none());
        assert!(Message::parse(":prefix-only").is_none());
    }

    #[test]
    fn display_adds_trailing_colon_when_needed() {
        let msg = Message::new("PRIVMSG", vec!["#c".into(), "CARROT CARROT".into()]);
        assert_eq!(msg.to_string(), "PRIVMSG #c :CARROT CARROT");

        let msg = Message::new("JOIN", vec!["#c".into()]);
        assert_eq!(msg.to_string(), "JOIN #c");
    }
}
