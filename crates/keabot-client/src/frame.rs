const EVENT_MARKER: &str = "event:";
const DATA_MARKER: &str = "data:";

/// One `event:`/`data:` record taken off the wire, before typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Value of the preceding `event:` line, or empty when there was none.
    pub event_type: String,
    pub payload: String,
}

/// Whether an `event:` line is waiting for its `data:` line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    AwaitingPayload(String),
}

impl FrameState {
    /// Event type a `data:` line would be tagged with right now.
    pub fn event_type(&self) -> &str {
        match self {
            FrameState::Idle => "",
            FrameState::AwaitingPayload(event_type) => event_type,
        }
    }
}

/// Line-oriented frame decoder.
///
/// Only newline-terminated lines are consumed; an unterminated trailing
/// fragment stays buffered until more text arrives. Every `data:` line
/// completes a frame on its own. Completing a frame from `AwaitingPayload`
/// returns the decoder to `Idle`, so a second `data:` line with no new
/// `event:` line is emitted with an empty event type.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    state: FrameState,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` and returns every frame completed by it, in order.
    pub fn push_text(&mut self, text: &str) -> Vec<Frame> {
        // The buffer never holds a newline between calls, so only `text`
        // needs scanning.
        let Some(offset) = text.rfind('\n') else {
            self.buffer.push_str(text);
            return Vec::new();
        };
        let last_newline = self.buffer.len() + offset;
        self.buffer.push_str(text);

        let complete: String = self.buffer.drain(..=last_newline).collect();
        let mut frames = Vec::new();
        for raw_line in complete.split_terminator('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            if let Some(frame) = self.apply_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn apply_line(&mut self, line: &str) -> Option<Frame> {
        if let Some(rest) = line.strip_prefix(EVENT_MARKER) {
            self.state = FrameState::AwaitingPayload(rest.trim_start().to_string());
            return None;
        }
        let rest = line.strip_prefix(DATA_MARKER)?;
        let payload = rest.strip_prefix(' ').unwrap_or(rest).to_string();
        let event_type = match std::mem::take(&mut self.state) {
            FrameState::AwaitingPayload(event_type) => event_type,
            FrameState::Idle => String::new(),
        };
        Some(Frame {
            event_type,
            payload,
        })
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// Unterminated text waiting for its newline.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}
