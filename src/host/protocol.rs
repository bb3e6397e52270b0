use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMessage {
    pub seq: u64,
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub content: HostMessageContent,
}

/// Variants are tried in order; `Request` goes last since its only
/// required field also appears in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostMessageContent {
    Response {
        request_seq: u64,
        success: bool,
        command: String,
        message: Option<String>,
        body: Option<Value>,
    },
    Event {
        event: String,
        body: Option<Value>,
    },
    Request {
        command: String,
        arguments: Option<Value>,
    },
}

impl HostMessage {
    pub fn request(seq: u64, command: &str, arguments: Option<Value>) -> Self {
        Self {
            seq,
            msg_type: "request".to_string(),
            content: HostMessageContent::Request {
                command: command.to_string(),
                arguments,
            },
        }
    }

    /// Command name when this is a request.
    pub fn command(&self) -> Option<&str> {
        match &self.content {
            HostMessageContent::Request { command, .. } => Some(command),
            _ => None,
        }
    }
}

/// Write one `Content-Length` framed message and flush.
pub fn write_message<W: Write>(out: &mut W, msg: &HostMessage) -> io::Result<()> {
    let json = serde_json::to_string(msg)?;
    write!(out, "Content-Length: {}\r\n\r\n{}", json.len(), json)?;
    out.flush()
}

/// Read one framed message. `Ok(None)` means the input is exhausted.
///
/// A body that is not a valid message is reported as `InvalidData` after it
/// has been consumed, so the next read starts on the following frame. A frame
/// without a usable `Content-Length` is also `InvalidData`, but its body
/// cannot be skipped and the stream is no longer aligned.
pub fn read_message<R: BufRead>(input: &mut R) -> io::Result<Option<HostMessage>> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut saw_header = false;

    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return if saw_header {
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated header"))
            } else {
                Ok(None)
            };
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;
        if let Some(value) = header.strip_prefix("Content-Length:") {
            content_length = value.trim().parse().ok();
        }
    }

    let length = content_length
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing Content-Length"))?;
    let mut body = vec![0u8; length];
    input.read_exact(&mut body)?;

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
