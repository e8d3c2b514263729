//! Incremental decoding of streamed response bodies.
//!
//! Transports give no guarantee that a network chunk ends on a line
//! boundary, so bytes are buffered in a [`LineBuffer`] and only complete
//! lines are handed to the fragment decoders.

use serde::Deserialize;

use crate::error::Error;

/// Prefix of a chat fragment line.
pub const DATA_PREFIX: &str = "data: ";

/// One unit of a streamed chat response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatChunk {
    /// Incremental text to append to the assistant message.
    Delta { text: String },
    /// The response body ended.
    Done,
}

/// One unit of a streamed model download.
#[derive(Debug, Clone, PartialEq)]
pub enum PullEvent {
    Status(PullStatus),
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullStatus {
    pub status: String,
    pub digest: Option<String>,
    pub total: Option<u64>,
    pub completed: Option<u64>,
}

impl PullStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            digest: None,
            total: None,
            completed: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Reassembles newline-terminated lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Take whatever is left after the body ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest);
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ChatPayload {
    #[serde(default)]
    text: Option<String>,
}

/// Decode one line of a chat response body.
///
/// Returns `Ok(None)` for lines that carry no text: lines without the
/// `data: ` prefix and payloads whose `text` is absent or empty.
pub fn decode_chat_line(line: &str) -> Result<Option<String>, Error> {
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };

    let payload: ChatPayload = serde_json::from_str(data)?;
    Ok(payload.text.filter(|text| !text.is_empty()))
}

#[derive(Deserialize)]
struct PullPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
}

/// Decode one NDJSON line of a pull response body.
///
/// Blank lines and objects carrying neither `status` nor `error` yield `None`.
pub fn decode_pull_line(line: &str) -> Result<Option<PullEvent>, Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let payload: PullPayload = serde_json::from_str(line)?;
    if let Some(message) = payload.error {
        return Ok(Some(PullEvent::Error { message }));
    }
    Ok(payload.status.map(|status| {
        PullEvent::Status(PullStatus {
            status,
            digest: payload.digest,
            total: payload.total,
            completed: payload.completed,
        })
    }))
}
