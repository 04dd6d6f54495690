//! Incremental decoding of `text/event-stream` bodies.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// The `event:` field, `message` when the frame had none.
    pub event: String,
    pub data: String,
}

/// Buffers raw body chunks and yields complete events.
///
/// Chunks may end anywhere, including inside a frame or a multi-byte
/// character; only complete frames are decoded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, separator_len)) = frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + separator_len).collect();
            if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame[..end]))
            {
                events.push(event);
            }
        }
        events
    }
}

/// Position of the first blank line, and the length of the separator.
fn frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buffer, b"\n\n").map(|i| (i, 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Frames with no data lines (such as heartbeat comments) dispatch nothing.
fn parse_frame(frame: &str) -> Option<ServerEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => (),
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(ServerEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}
