use bytes::BytesMut;
use serde::Deserialize;
use transcode_core::ProgressEvent;

/// Largest event a progress stream may send when no limit is configured.
pub const DEFAULT_MAX_EVENT_BYTES: usize = 64 * 1024;

/// Incremental decoder for `text/event-stream` bodies.
///
/// Feed raw chunks as they arrive; each complete event yields its `data` payload
/// (multiple `data` lines joined with `\n`). Comments and other fields are ignored.
/// An event, or an unterminated line, larger than the configured limit is an error.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    data_lines: Vec<String>,
    data_bytes: usize,
    max_event_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_event_bytes(DEFAULT_MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_event_bytes(max_event_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            data_lines: Vec::new(),
            data_bytes: 0,
            max_event_bytes,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, DecodeError> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let mut line = &raw[..pos];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line);
            if let Some(payload) = self.process_line(&line)? {
                payloads.push(payload);
            }
        }
        if self.buffer.len() + self.data_bytes > self.max_event_bytes {
            return Err(self.too_large());
        }
        Ok(payloads)
    }

    fn process_line(&mut self, line: &str) -> Result<Option<String>, DecodeError> {
        if line.is_empty() {
            if self.data_lines.is_empty() {
                return Ok(None);
            }
            let payload = self.data_lines.join("\n");
            self.data_lines.clear();
            self.data_bytes = 0;
            return Ok(Some(payload));
        }
        if line.starts_with(':') {
            return Ok(None);
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_bytes += value.len();
            if self.data_bytes > self.max_event_bytes {
                return Err(self.too_large());
            }
            self.data_lines.push(value.to_string());
        }
        Ok(None)
    }

    fn too_large(&self) -> DecodeError {
        DecodeError::EventTooLarge {
            max_bytes: self.max_event_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid progress payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("progress payload without percent")]
    MissingPercent,
    #[error("progress event exceeds {max_bytes} bytes")]
    EventTooLarge { max_bytes: usize },
}

#[derive(Debug, Deserialize)]
struct WireProgress {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    percent: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

/// Decodes one event payload: `{percent}`, `{done: true}` or `{error: true, percent}`.
pub fn decode_progress_data(data: &str) -> Result<ProgressEvent, DecodeError> {
    let wire: WireProgress = serde_json::from_str(data)?;
    if wire.done {
        return Ok(ProgressEvent::Done);
    }
    if wire.error {
        return Ok(ProgressEvent::Error {
            percent: wire.percent.unwrap_or(0.0),
            message: wire.message,
        });
    }
    let percent = wire.percent.ok_or(DecodeError::MissingPercent)?;
    Ok(ProgressEvent::Progress { percent })
}
