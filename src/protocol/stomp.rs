//! STOMP 1.2 frame codec
//!
//! The push channel carries STOMP frames as websocket text messages. A bare
//! newline is a heart-beat and decodes to `None`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEST_ROUNDS: &str = "/topic/game";
pub const DEST_CHAT: &str = "/topic/chat";
pub const DEST_WAGER_OUTCOMES: &str = "/user/queue/bet-results";

const NUL: char = '\0';

/// Frame commands used by the client and the game server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameCommand {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl FrameCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    fn parse(line: &str) -> Option<Self> {
        Some(match line {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are never escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for FrameCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: FrameCommand,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Frame {
    pub fn new(command: FrameCommand) -> Self {
        Self {
            command,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// CONNECT frame with the client heart-beat in milliseconds
    pub fn connect(host: &str, heartbeat: Duration, token: Option<&str>) -> Self {
        let beat = heartbeat.as_millis();
        let frame = Frame::new(FrameCommand::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", format!("{},{}", beat, beat));
        match token {
            Some(token) => frame.header("Authorization", format!("Bearer {}", token)),
            None => frame,
        }
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(FrameCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(FrameCommand::Unsubscribe).header("id", id)
    }

    pub fn disconnect() -> Self {
        Frame::new(FrameCommand::Disconnect)
    }

    /// Text of an ERROR frame, as shown to the player
    pub fn error_message(&self) -> String {
        self.get("message")
            .filter(|m| !m.is_empty())
            .unwrap_or("Connection error")
            .to_string()
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(key));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(key);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }

    /// Decode one frame; `Ok(None)` for a heart-beat
    pub fn decode(raw: &str) -> Result<Option<Frame>> {
        let trimmed = raw.trim_start_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Ok(None);
        }

        let (head, rest) = split_head(trimmed)
            .ok_or_else(|| Error::Protocol("frame without header terminator".to_string()))?;

        let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
        let command_line = lines.next().unwrap_or_default();
        let command = FrameCommand::parse(command_line)
            .ok_or_else(|| Error::Protocol(format!("unknown command '{}'", command_line)))?;

        let escape = command.escapes_headers();
        let mut headers = BTreeMap::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Protocol(format!("malformed header '{}'", line)))?;
            let (key, value) = if escape {
                (unescape_header(key)?, unescape_header(value)?)
            } else {
                (key.to_string(), value.to_string())
            };
            // Repeated headers: the first occurrence wins
            headers.entry(key).or_insert(value);
        }

        let body = match headers.get("content-length") {
            Some(len) => {
                let len: usize = len
                    .trim()
                    .parse()
                    .map_err(|_| Error::Protocol(format!("bad content-length '{}'", len)))?;
                let terminated = rest.get(len..).is_some_and(|tail| tail.starts_with(NUL));
                match rest.get(..len) {
                    Some(body) if terminated => body.to_string(),
                    _ => {
                        return Err(Error::Protocol(
                            "body does not match content-length".to_string(),
                        ))
                    }
                }
            }
            None => {
                let end = rest
                    .find(NUL)
                    .ok_or_else(|| Error::Protocol("frame without NUL terminator".to_string()))?;
                rest[..end].to_string()
            }
        };

        Ok(Some(Frame { command, headers, body }))
    }
}

fn split_head(frame: &str) -> Option<(&str, &str)> {
    if let Some(pos) = frame.find("\n\n") {
        return Some((&frame[..pos], &frame[pos + 2..]));
    }
    frame
        .find("\r\n\r\n")
        .map(|pos| (&frame[..pos], &frame[pos + 4..]))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
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
            other => {
                return Err(Error::Protocol(format!(
                    "undefined escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

/// Interval at which the client must send heart-beats, if any
///
/// `server` is the `heart-beat` header of the CONNECTED frame.
pub fn outgoing_heartbeat(client: Duration, server: Option<&str>) -> Option<Duration> {
    let client_ms = client.as_millis() as u64;
    let server_ms = server
        .and_then(|h| h.split(',').nth(1))
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    if client_ms == 0 || server_ms == 0 {
        None
    } else {
        Some(Duration::from_millis(client_ms.max(server_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_frame_encoding() {
        let frame = Frame::connect("api.example", Duration::from_secs(4), Some("tok"));
        let text = frame.encode();
        assert!(text.starts_with("CONNECT\n"));
        assert!(text.contains("heart-beat:4000,4000\n"));
        assert!(text.contains("Authorization:Bearer tok\n"));
        assert!(text.ends_with("\n\n\0"));
    }

    #[test]
    fn test_message_decoding() {
        let raw = "MESSAGE\ndestination:/topic/game\nsubscription:sub-0\nmessage-id:1\n\n{\"gameId\":1}\0";
        let frame = Frame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.command, FrameCommand::Message);
        assert_eq!(frame.get("destination"), Some(DEST_ROUNDS));
        assert_eq!(frame.body, "{\"gameId\":1}");
    }

    #[test]
    fn test_heartbeat_decodes_to_none() {
        assert_eq!(Frame::decode("\n").unwrap(), None);
        assert_eq!(Frame::decode("\r\n").unwrap(), None);
    }

    #[test]
    fn test_header_escaping() {
        let frame = Frame::new(FrameCommand::Send)
            .header("note", "a:b\nc")
            .with_body("x");
        let decoded = Frame::decode(&frame.encode()).unwrap().unwrap();
        assert_eq!(decoded.get("note"), Some("a:b\nc"));
    }

    #[test]
    fn test_content_length_body() {
        let raw = "MESSAGE\ncontent-length:3\ndestination:/topic/chat\n\nabc\0";
        let frame = Frame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.body, "abc");

        let short = "MESSAGE\ncontent-length:9\n\nabc\0";
        assert!(Frame::decode(short).is_err());
    }

    #[test]
    fn test_malformed_frames() {
        assert!(Frame::decode("BOGUS\n\n\0").is_err());
        assert!(Frame::decode("MESSAGE\ndestination:/topic/game\n\nbody").is_err());
        assert!(Frame::decode("MESSAGE\nno-colon\n\n\0").is_err());
    }

    #[test]
    fn test_error_frame_message() {
        let frame = Frame::decode("ERROR\nmessage:Session expired\n\n\0").unwrap().unwrap();
        assert_eq!(frame.error_message(), "Session expired");
        let bare = Frame::new(FrameCommand::Error);
        assert_eq!(bare.error_message(), "Connection error");
    }

    #[test]
    fn test_heartbeat_negotiation() {
        let client = Duration::from_secs(4);
        assert_eq!(outgoing_heartbeat(client, Some("0,10000")), Some(Duration::from_secs(10)));
        assert_eq!(outgoing_heartbeat(client, Some("5000,0")), None);
        assert_eq!(outgoing_heartbeat(client, None), None);
        assert_eq!(outgoing_heartbeat(Duration::ZERO, Some("0,1000")), None);
    }
}
