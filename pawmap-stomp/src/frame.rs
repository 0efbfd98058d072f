//! STOMP frame model and encoding
//!
//! A frame is a command line, `name:value` header lines, an empty line, a
//! body and a terminating NUL byte. Header names and values are escaped per
//! STOMP 1.2 except in `CONNECT` / `CONNECTED` frames.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while decoding a frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Unknown STOMP command: {0}")]
    UnknownCommand(String),

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Body does not end with NUL after content-length {0}")]
    ContentLengthMismatch(usize),

    /// The stream cannot be resynchronised after this error
    #[error("Frame exceeds the {0} byte limit")]
    FrameTooLarge(usize),
}

/// STOMP client and server commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED frames carry raw (unescaped) headers.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order. Repeated names are kept; lookups return the first.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header (builder style)
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body (builder style)
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value for a header name
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Encode to the wire representation, including the trailing NUL.
    ///
    /// A `content-length` header is added for non-empty bodies unless one is
    /// already present.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());

        out.push_str(self.command.as_str());
        out.push('\n');

        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }

        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

pub(crate) fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn unescape_header(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

pub(crate) fn escapes_headers(command: Command) -> bool {
    command.escapes_headers()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_send_with_body() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/location/subscribe")
            .header("content-type", "application/json")
            .body(r#"{"a":1}"#);

        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/location/subscribe\ncontent-type:application/json\ncontent-length:7\n\n{\"a\":1}\0"
        );
    }

    #[test]
    fn test_encode_connect_does_not_escape() {
        let frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", "localhost:8080");

        assert_eq!(
            frame.encode(),
            "CONNECT\naccept-version:1.2\nhost:localhost:8080\n\n\0"
        );
    }

    #[test]
    fn test_escape_roundtrip_special_chars() {
        let raw = "a:b\\c\nd";
        let escaped = escape_header(raw);
        assert_eq!(escaped, "a\\cb\\\\c\\nd");
        assert_eq!(unescape_header(&escaped).unwrap(), raw);
    }

    #[test]
    fn test_unescape_rejects_unknown_sequence() {
        assert!(matches!(
            unescape_header("bad\\t"),
            Err(FrameError::InvalidEscape(_))
        ));
    }

    #[test]
    fn test_command_from_str() {
        assert_eq!("MESSAGE".parse::<Command>().unwrap(), Command::Message);
        assert!("message".parse::<Command>().is_err());
    }

    #[test]
    fn test_get_header_returns_first() {
        let frame = Frame::new(Command::Message)
            .header("destination", "/topic/posts")
            .header("destination", "/topic/other");
        assert_eq!(frame.get_header("destination"), Some("/topic/posts"));
        assert_eq!(frame.get_header("missing"), None);
    }
}
