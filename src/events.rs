//! Stream event types for the valuation engine API.
//!
//! Contains the StreamEvent enum with all event variants the engine emits
//! over a streaming response, one JSON object per frame, discriminated by
//! a `type` field.

use serde::{Deserialize, Serialize};

/// Typed events from the valuation engine stream.
///
/// Exactly one `Complete` or `Error` terminates a stream attempt; anything
/// arriving after that is discarded by the accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Informational status update (0-100)
    Progress {
        progress: u8,
        #[serde(default)]
        message: Option<String>,
    },
    /// A report section has begun generating
    SectionLoading {
        section: String,
        phase: u32,
        progress: u8,
    },
    /// A report section is complete
    SectionUpdate {
        section: String,
        html: String,
        phase: u32,
        progress: u8,
    },
    /// Incremental conversational text
    MessageChunk {
        content: String,
        /// Set on the final chunk of a turn. An empty chunk with this flag
        /// set while nothing is streaming is a no-op signal, not a new
        /// message.
        #[serde(default)]
        is_complete: bool,
    },
    /// Conversational turn finished
    MessageComplete,
    /// Entire attempt finished successfully
    Complete {
        html: String,
        correlation_id: String,
        /// Remaining payload fields, kept opaque for the caller.
        #[serde(flatten)]
        payload: serde_json::Map<String, serde_json::Value>,
    },
    /// Attempt failed with a backend-reported error
    Error {
        message: String,
        #[serde(default)]
        error_type: Option<String>,
    },
}

/// Event type tags the decoder recognizes. Anything else on the wire is
/// ignored for forward compatibility.
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "progress",
    "section_loading",
    "section_update",
    "message_chunk",
    "message_complete",
    "complete",
    "error",
];

impl StreamEvent {
    /// Returns the event type name as a string for logging purposes.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::SectionLoading { .. } => "section_loading",
            StreamEvent::SectionUpdate { .. } => "section_update",
            StreamEvent::MessageChunk { .. } => "message_chunk",
            StreamEvent::MessageComplete => "message_complete",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// True for the two variants that terminate a stream attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Complete { .. } | StreamEvent::Error { .. }
        )
    }
}
