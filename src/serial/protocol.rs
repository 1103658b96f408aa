use serde::{Deserialize, Serialize};

/// Opaque request payload for one command/response round trip.
///
/// Commands carry no identity beyond a single round trip; the transport
/// assumes exactly one command in flight per device, so there is no sequence
/// number correlating a response to a prior command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub payload: String,
}

impl Command {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Wire form: the payload with the CRLF terminator appended if absent.
    pub fn to_wire(&self) -> String {
        if self.payload.ends_with("\r\n") {
            self.payload.clone()
        } else {
            format!("{}\r\n", self.payload)
        }
    }
}

/// One response parsed from a received line.
///
/// Framing is a placeholder: ASCII payload only, no checksum or ack semantics
/// yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub payload: String,
}

impl Response {
    /// Parse one received line. `None` marks a malformed line, which callers
    /// treat as a distinct outcome from "no line arrived".
    pub fn from_wire(line: &str) -> Option<Self> {
        let trimmed = line.strip_suffix("\r\n").unwrap_or(line);
        if trimmed.is_empty() || trimmed.bytes().any(|b| b.is_ascii_control()) {
            return None;
        }
        Some(Self {
            payload: trimmed.to_string(),
        })
    }
}
