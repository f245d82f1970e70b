// Minimal STOMP 1.2 framing for the preview subscription
//
// Frame layout:
//   COMMAND EOL
//   (header ":" value EOL)*
//   EOL
//   body NUL
//
// Only text bodies are handled; the capture service publishes JSON.

use crate::error::{PanelError, PanelResult};

const NUL: char = '\0';

#[derive(Debug, Clone, PartialEq)]
pub struct StompFrame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn connect(host: &str) -> Self {
        StompFrame::new("CONNECT")
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        StompFrame::new("SUBSCRIBE")
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn encode(&self) -> String {
        // CONNECT and CONNECTED headers are never escaped
        let escape_headers = !matches!(self.command.as_str(), "CONNECT" | "CONNECTED");

        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(&self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            if escape_headers {
                out.push_str(&escape(name));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }

    /// Decode one frame. Heart-beats (bare end-of-lines) yield `None`.
    pub fn decode(raw: &str) -> PanelResult<Option<StompFrame>> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() {
            return Ok(None);
        }

        let (head, rest) = split_head(raw)
            .ok_or_else(|| PanelError::Protocol("frame without header terminator".to_string()))?;

        let mut lines = head.lines();
        let command = lines
            .next()
            .map(|line| line.trim_end_matches('\r').to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| PanelError::Protocol("frame without command".to_string()))?;

        let unescape_headers = !matches!(command.as_str(), "CONNECT" | "CONNECTED");
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| PanelError::Protocol(format!("malformed header '{}'", line)))?;
            if unescape_headers {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = StompFrame {
            command,
            headers,
            body: String::new(),
        };

        let content_length = frame
            .header("content-length")
            .and_then(|len| len.trim().parse::<usize>().ok());

        frame.body = match content_length {
            Some(len) if len <= rest.len() && rest.is_char_boundary(len) => rest[..len].to_string(),
            _ => rest.split(NUL).next().unwrap_or_default().to_string(),
        };

        Ok(Some(frame))
    }
}

fn split_head(raw: &str) -> Option<(&str, &str)> {
    let lf = raw.find("\n\n").map(|i| (i, 2));
    let crlf = raw.find("\r\n\r\n").map(|i| (i, 4));
    let (index, width) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 < b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    Some((&raw[..index], &raw[index + width..]))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
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

fn unescape(value: &str) -> PanelResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
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
                return Err(PanelError::Protocol(format!(
                    "invalid header escape '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_frame_layout() {
        let encoded = StompFrame::connect("localhost").encode();
        assert_eq!(
            encoded,
            "CONNECT\naccept-version:1.2\nhost:localhost\nheart-beat:0,0\n\n\0"
        );
    }

    #[test]
    fn test_decode_spring_message() {
        let raw = "MESSAGE\ndestination:/topic/fingerprint\ncontent-type:application/json\nsubscription:sub-0\nmessage-id:abc-1\ncontent-length:26\n\n{\"image\":\"x\",\"quality\":42}\0";
        let frame = StompFrame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.command, "MESSAGE");
        assert_eq!(frame.header("destination"), Some("/topic/fingerprint"));
        assert_eq!(frame.body, "{\"image\":\"x\",\"quality\":42}");
    }

    #[test]
    fn test_decode_without_content_length() {
        let frame = StompFrame::decode("CONNECTED\r\nversion:1.2\r\n\r\n\0")
            .unwrap()
            .unwrap();
        assert_eq!(frame.command, "CONNECTED");
        assert_eq!(frame.header("version"), Some("1.2"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_heartbeat_is_skipped() {
        assert_eq!(StompFrame::decode("\n").unwrap(), None);
        assert_eq!(StompFrame::decode("\r\n\r\n").unwrap(), None);
    }

    #[test]
    fn test_header_escaping() {
        let frame = StompFrame::new("SEND").with_header("note", "a:b\nc");
        let encoded = frame.encode();
        assert!(encoded.contains("note:a\\cb\\nc\n"));

        let decoded = StompFrame::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded.header("note"), Some("a:b\nc"));
    }

    #[test]
    fn test_repeated_header_keeps_first() {
        let frame = StompFrame::decode("MESSAGE\nfoo:1\nfoo:2\n\n\0").unwrap().unwrap();
        assert_eq!(frame.header("foo"), Some("1"));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(StompFrame::decode("MESSAGE\nno-terminator").is_err());
        assert!(StompFrame::decode("MESSAGE\nbadheader\n\n\0").is_err());
        assert!(StompFrame::decode("MESSAGE\nx:\\q\n\n\0").is_err());
    }
}
