//! Incremental decoder for OpenAI-style server-sent event streams.
//!
//! Bytes arrive in arbitrary slices; only complete lines are decoded, so a
//! multi-byte character or a JSON payload split across network reads is
//! reassembled before parsing.

use chatbench_application::ClientError;
use serde::Deserialize;

/// One decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A content delta. Chunks without content (role headers, reasoning
    /// deltas) decode to an empty delta so consumers still see every chunk.
    Content(String),
    /// The `[DONE]` terminator.
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Line-buffered SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `bytes` and returns the events completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, ClientError> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = decode_line(line.trim_end_matches(['\n', '\r']))? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Decodes whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Result<Vec<SseEvent>, ClientError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        Ok(decode_line(line.trim_end_matches('\r'))?.into_iter().collect())
    }
}

fn decode_line(line: &str) -> Result<Option<SseEvent>, ClientError> {
    // Comments, `event:`/`id:` fields and blank separators carry no content.
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let payload: ChunkPayload = serde_json::from_str(data)
        .map_err(|e| ClientError::Protocol(format!("invalid stream chunk: {e}")))?;

    if let Some(error) = payload.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ClientError::Api {
            status: 200,
            message,
        });
    }

    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();
    Ok(Some(SseEvent::Content(content)))
}
