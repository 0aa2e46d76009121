use tracing::debug;

use crate::event::AgentEvent;
use crate::frame::FrameDecoder;
use crate::utf8::Utf8Reassembler;

/// An event together with the ordinal of the frame it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEvent {
    /// Zero-based position of the frame among all frames of the stream,
    /// including frames that were dropped.
    pub frame: u64,
    pub event: AgentEvent,
}

/// Bytes-to-events pipeline for a single stream.
///
/// Owns the UTF-8 carry-over and the frame state; one instance per stream.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    text: Utf8Reassembler,
    frames: FrameDecoder,
    frames_decoded: u64,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the events it completed, in wire order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<DecodedEvent> {
        let text = self.text.decode(chunk);
        if text.is_empty() {
            return Vec::new();
        }
        let mut events = Vec::new();
        for frame in self.frames.push_text(&text) {
            let ordinal = self.frames_decoded;
            self.frames_decoded += 1;
            if let Some(event) = AgentEvent::from_frame(&frame) {
                events.push(DecodedEvent {
                    frame: ordinal,
                    event,
                });
            }
        }
        events
    }

    /// Ends the stream.
    ///
    /// A trailing line without a newline is never a complete record, so it is
    /// discarded along with any truncated UTF-8 sequence.
    pub fn finish(&mut self) {
        let leftover_bytes = self.text.pending_len();
        let leftover_text = self.frames.buffered().len();
        if leftover_bytes > 0 || leftover_text > 0 {
            debug!(
                leftover_bytes,
                leftover_text, "discarding unterminated input at end of stream"
            );
        }
        *self = Self {
            frames_decoded: self.frames_decoded,
            ..Self::default()
        };
    }

    /// Number of frames completed so far, including dropped ones.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn frame_decoder(&self) -> &FrameDecoder {
        &self.frames
    }
}
