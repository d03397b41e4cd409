//! Server-Sent Events frame codec
//!
//! Frames use the standard text format:
//!
//! ```text
//! id: 42
//! event: play_audio
//! data: {"file": "number_1"}
//!
//! ```
//!
//! Lines beginning with `:` are comments (heartbeats) and are skipped.

/// One decoded SSE frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    /// Event name (`event:` line)
    pub event: Option<String>,
    /// Payload; multiple `data:` lines are joined with `\n`
    pub data: String,
    /// Event ID for resumption
    pub id: Option<String>,
}

impl SseFrame {
    /// Create a named frame
    pub fn new(event: &str, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.to_string()),
            data: data.into(),
            id: None,
        }
    }

    /// Format as SSE protocol string
    pub fn to_sse_string(&self) -> String {
        let mut output = String::new();

        if let Some(id) = &self.id {
            output.push_str(&format!("id: {}\n", id));
        }

        if let Some(event) = &self.event {
            output.push_str(&format!("event: {}\n", event));
        }

        for line in self.data.split('\n') {
            output.push_str(&format!("data: {}\n", line));
        }
        output.push('\n');

        output
    }
}

/// Incremental decoder for a chunked SSE byte stream
///
/// Chunks may split frames (or UTF-8 sequences) anywhere; bytes are buffered
/// until a blank line terminates a frame.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);
            if let Some(frame) = parse_frame(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes held waiting for the rest of a frame
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut frame = SseFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => frame.id = Some(value.to_string()),
            // retry and unknown fields are ignored
            _ => {}
        }
    }

    if frame.event.is_none() && data_lines.is_empty() {
        // comment-only frame (heartbeat)
        return None;
    }
    frame.data = data_lines.join("\n");
    Some(frame)
}
