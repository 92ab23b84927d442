//! Per-session state: the data model the accumulator folds events into.
//!
//! One [`SessionState`] exists per logical conversation. It is exclusively
//! owned and mutated by the single active stream attempt for that session
//! (enforced by the coordinator's single-flight lock), so no locking is
//! needed within an attempt.

mod accumulator;
pub mod reconcile;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An accumulating unit of conversational text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Locally assigned id, stable from first chunk until completion.
    pub id: String,
    /// Full text so far; only ever grows while streaming.
    pub content: String,
    /// Whether chunks are still being appended.
    pub is_streaming: bool,
    /// Whether the turn has finished.
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new streaming message. The id is assigned here, on the
    /// first chunk of a turn.
    pub fn new_streaming() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: String::new(),
            is_streaming: true,
            is_complete: false,
            created_at: Utc::now(),
        }
    }

    /// Mark the turn finished.
    pub fn finalize(&mut self) {
        self.is_streaming = false;
        self.is_complete = true;
    }
}

/// Generation status of a report section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Loading,
    Completed,
    Error,
}

/// One phase-tagged fragment of a progressively generated report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSection {
    /// Section key, e.g. a report region name.
    pub id: String,
    /// Generation phase; used for the watermark, not for display order.
    pub phase: u32,
    /// Fragment content; empty while loading.
    pub html: String,
    pub progress: u8,
    pub status: SectionStatus,
    pub updated_at: DateTime<Utc>,
}

/// The authoritative end state once `complete` is received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FinalReport {
    pub html: String,
    pub correlation_id: String,
    /// The rest of the `complete` payload, opaque to the coordinator.
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// State updates emitted toward the caller as events are folded in.
///
/// This is the only surface the presentation layer sees.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Progress {
        progress: u8,
        message: Option<String>,
    },
    SectionLoading {
        id: String,
        phase: u32,
        progress: u8,
    },
    SectionUpdated {
        id: String,
        html: String,
        phase: u32,
        progress: u8,
    },
    MessageChunk {
        message_id: String,
        content: String,
    },
    MessageCompleted {
        message_id: String,
        content: String,
    },
    Completed {
        html: String,
        correlation_id: String,
        payload: serde_json::Map<String, serde_json::Value>,
    },
    Failed {
        message: String,
        error_type: String,
    },
}

/// All accumulated state for one logical session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    /// Externally supplied id, stable for the session's lifetime.
    pub session_id: String,
    /// Id to use on requests; replaced by the backend's correlation id
    /// once one has been assigned.
    pub effective_id: String,
    pub messages: Vec<Message>,
    /// Pointer to the current streaming message. Owned and updated only by
    /// the accumulator; see [`SessionState::apply`].
    pub(crate) current_message_id: Option<String>,
    /// Live sections in first-insertion order, keyed by id.
    pub sections: Vec<ReportSection>,
    /// Highest generation phase seen so far.
    pub phase_watermark: u32,
    /// Latest overall progress indicator, 0-100.
    pub progress: u8,
    pub final_report: Option<FinalReport>,
    /// Set once a terminal event has been applied for the current attempt;
    /// later events are discarded.
    pub(crate) terminated: bool,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self {
            effective_id: session_id.clone(),
            session_id,
            messages: Vec::new(),
            current_message_id: None,
            sections: Vec::new(),
            phase_watermark: 0,
            progress: 0,
            final_report: None,
            terminated: false,
        }
    }

    /// Reset per-attempt state before a (re)try. Sections and completed
    /// messages are preserved so a retry never wipes already-rendered
    /// content; a message left mid-stream by a failed attempt is dropped,
    /// since the retry re-streams the whole turn and appending onto the
    /// remnant would duplicate its text.
    pub fn begin_attempt(&mut self) {
        self.terminated = false;
        self.messages.retain(|m| !(m.is_streaming && !m.is_complete));
        self.current_message_id = None;
    }

    /// Look up a section by key.
    pub fn section(&self, id: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// The message currently receiving chunks, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.streaming_message_index().map(|i| &self.messages[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_uses_session_id_as_effective_id() {
        let state = SessionState::new("sess-1");
        assert_eq!(state.session_id, "sess-1");
        assert_eq!(state.effective_id, "sess-1");
        assert!(state.messages.is_empty());
        assert!(state.sections.is_empty());
        assert!(state.final_report.is_none());
    }

    #[test]
    fn test_new_streaming_message_flags() {
        let msg = Message::new_streaming();
        assert!(msg.is_streaming);
        assert!(!msg.is_complete);
        assert!(msg.content.is_empty());
        assert!(Uuid::parse_str(&msg.id).is_ok());
    }

    #[test]
    fn test_finalize_flips_flags() {
        let mut msg = Message::new_streaming();
        msg.content.push_str("done");
        msg.finalize();
        assert!(!msg.is_streaming);
        assert!(msg.is_complete);
        assert_eq!(msg.content, "done");
    }

    #[test]
    fn test_begin_attempt_preserves_partial_content() {
        let mut state = SessionState::new("sess-1");
        state.sections.push(ReportSection {
            id: "intro".to_string(),
            phase: 1,
            html: "<p>kept</p>".to_string(),
            progress: 100,
            status: SectionStatus::Completed,
            updated_at: Utc::now(),
        });
        state.terminated = true;

        state.begin_attempt();
        assert!(!state.terminated);
        assert_eq!(state.sections.len(), 1);
        assert_eq!(state.section("intro").unwrap().html, "<p>kept</p>");
    }

    #[test]
    fn test_begin_attempt_drops_mid_stream_message() {
        let mut state = SessionState::new("sess-1");
        let mut earlier = Message::new_streaming();
        earlier.content.push_str("earlier turn");
        earlier.finalize();
        state.messages.push(earlier);

        let mut half = Message::new_streaming();
        half.content.push_str("Hello");
        state.current_message_id = Some(half.id.clone());
        state.messages.push(half);

        state.begin_attempt();
        // The completed turn survives, the half-streamed one is gone.
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "earlier turn");
        assert!(state.current_message_id.is_none());
        assert!(state.streaming_message().is_none());
    }
}
