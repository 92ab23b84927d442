//! Frame decoder for the engine's newline-delimited JSON stream.
//!
//! Each frame is one JSON object on its own line, tagged by a `type` field.
//! Two failure modes are handled differently on purpose:
//!
//! - Unknown `type` values are ignored (forward compatibility with newer
//!   backends).
//! - Malformed frames (JSON parse failures, missing required fields) are
//!   logged and skipped; the stream continues.
//!
//! The coordinator favors availability of partial results over strict
//! protocol conformance, so neither case aborts the stream.

use tracing::{debug, warn};

use crate::events::{StreamEvent, KNOWN_EVENT_TYPES};

/// Decode a single line into a [`StreamEvent`].
///
/// Returns `None` for empty lines, unknown event types, and malformed
/// frames; only the latter two are logged.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "skipping malformed frame");
            return None;
        }
    };

    let event_type = match value.get("type").and_then(|t| t.as_str()) {
        Some(t) => t.to_string(),
        None => {
            warn!("skipping frame without a type field");
            return None;
        }
    };

    if !KNOWN_EVENT_TYPES.contains(&event_type.as_str()) {
        debug!(event_type = %event_type, "ignoring unknown event type");
        return None;
    }

    match serde_json::from_value::<StreamEvent>(value) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(event_type = %event_type, error = %e, "skipping malformed frame");
            None
        }
    }
}

/// Splits a byte stream into lines and decodes each one.
///
/// Stateful so that a frame split across two network chunks is reassembled
/// before decoding. Restartable per stream attempt (create a fresh decoder),
/// not resumable mid-stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning all events completed by it.
    ///
    /// Non-UTF-8 chunks are decoded lossily; the engine only emits UTF-8,
    /// so replacement characters indicate transport corruption, which the
    /// per-line JSON parse then reports as a skipped frame.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos]
                .trim_end_matches('\r')
                .to_string();
            self.buffer.drain(..=newline_pos);
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever remains in the buffer once the stream ends.
    ///
    /// Servers are not required to terminate the final frame with a newline.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(line.trim_end_matches('\r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line_progress() {
        let event = decode_line(r#"{"type": "progress", "progress": 40, "message": "working"}"#)
            .expect("should decode");
        assert_eq!(
            event,
            StreamEvent::Progress {
                progress: 40,
                message: Some("working".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_line_empty_returns_none() {
        assert!(decode_line("").is_none());
        assert!(decode_line("   ").is_none());
    }

    #[test]
    fn test_decode_line_malformed_json_skipped() {
        assert!(decode_line("{not json at all").is_none());
    }

    #[test]
    fn test_decode_line_unknown_type_ignored() {
        assert!(decode_line(r#"{"type": "telemetry", "cpu": 95}"#).is_none());
    }

    #[test]
    fn test_decode_line_known_type_missing_fields_skipped() {
        // section_update without html is malformed, not unknown
        assert!(decode_line(r#"{"type": "section_update", "section": "intro"}"#).is_none());
    }

    #[test]
    fn test_decode_line_missing_type_field_skipped() {
        assert!(decode_line(r#"{"progress": 10}"#).is_none());
    }

    #[test]
    fn test_feed_splits_multiple_lines() {
        let mut decoder = FrameDecoder::new();
        let chunk = concat!(
            r#"{"type": "progress", "progress": 10}"#,
            "\n",
            r#"{"type": "message_chunk", "content": "Hi"}"#,
            "\n",
        );
        let events = decoder.feed(chunk.as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type_name(), "progress");
        assert_eq!(events[1].event_type_name(), "message_chunk");
    }

    #[test]
    fn test_feed_reassembles_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(br#"{"type": "message_chunk", "con"#);
        assert!(events.is_empty());
        let events = decoder.feed("tent\": \"Hello\"}\n".as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            StreamEvent::MessageChunk {
                content: "Hello".to_string(),
                is_complete: false,
            }
        );
    }

    #[test]
    fn test_feed_handles_crlf() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed("{\"type\": \"message_complete\"}\r\n".as_bytes());
        assert_eq!(events, vec![StreamEvent::MessageComplete]);
    }

    #[test]
    fn test_feed_continues_past_malformed_frame() {
        let mut decoder = FrameDecoder::new();
        let chunk = concat!(
            "garbage line\n",
            r#"{"type": "progress", "progress": 50}"#,
            "\n",
        );
        let events = decoder.feed(chunk.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type_name(), "progress");
    }

    #[test]
    fn test_finish_decodes_trailing_frame_without_newline() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder
            .feed(r#"{"type": "message_complete"}"#.as_bytes())
            .is_empty());
        assert_eq!(decoder.finish(), Some(StreamEvent::MessageComplete));
        assert_eq!(decoder.finish(), None);
    }
}
