//! The incremental state accumulator: folds stream events into
//! [`SessionState`].
//!
//! All mutation goes through [`SessionState::apply`], one exhaustive match
//! over the event taxonomy. Callers never touch the current-message pointer
//! or the section collection directly; they receive [`SessionUpdate`]s and
//! render from those or from a state snapshot.

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::events::StreamEvent;

use super::{FinalReport, Message, ReportSection, SectionStatus, SessionState, SessionUpdate};
use super::reconcile;

impl SessionState {
    /// Fold one event into the state, returning the updates to surface to
    /// the caller.
    ///
    /// Terminal events (`complete`, `error`) mark the attempt terminated;
    /// anything applied afterwards is discarded. A `complete` carrying an
    /// empty report body is a validation failure and leaves the state
    /// untouched.
    pub fn apply(&mut self, event: StreamEvent) -> CoordinatorResult<Vec<SessionUpdate>> {
        if self.terminated {
            debug!(
                session_id = %self.session_id,
                event_type = event.event_type_name(),
                "discarding event after terminal event"
            );
            return Ok(Vec::new());
        }

        match event {
            StreamEvent::Progress { progress, message } => {
                self.progress = progress.min(100);
                Ok(vec![SessionUpdate::Progress {
                    progress: self.progress,
                    message,
                }])
            }

            StreamEvent::SectionLoading {
                section,
                phase,
                progress,
            } => {
                let progress = progress.min(100);
                self.upsert_section(&section, phase, String::new(), progress, SectionStatus::Loading);
                Ok(vec![SessionUpdate::SectionLoading {
                    id: section,
                    phase,
                    progress,
                }])
            }

            StreamEvent::SectionUpdate {
                section,
                html,
                phase,
                progress,
            } => {
                let progress = progress.min(100);
                self.upsert_section(&section, phase, html.clone(), progress, SectionStatus::Completed);
                self.phase_watermark = self.phase_watermark.max(phase);
                Ok(vec![SessionUpdate::SectionUpdated {
                    id: section,
                    html,
                    phase,
                    progress,
                }])
            }

            StreamEvent::MessageChunk {
                content,
                is_complete,
            } => {
                let mut updates = Vec::new();

                let index = match self.streaming_message_index() {
                    Some(index) => Some(index),
                    None if is_complete && content.is_empty() => {
                        // Completion signal with nothing streaming: a no-op,
                        // never a new empty message.
                        None
                    }
                    None => {
                        let message = Message::new_streaming();
                        self.current_message_id = Some(message.id.clone());
                        self.messages.push(message);
                        Some(self.messages.len() - 1)
                    }
                };

                if let Some(index) = index {
                    if !content.is_empty() {
                        let message = &mut self.messages[index];
                        message.content.push_str(&content);
                        updates.push(SessionUpdate::MessageChunk {
                            message_id: message.id.clone(),
                            content,
                        });
                    }
                    if is_complete {
                        updates.push(self.finalize_streaming_message(index));
                    }
                }
                Ok(updates)
            }

            StreamEvent::MessageComplete => match self.streaming_message_index() {
                Some(index) => Ok(vec![self.finalize_streaming_message(index)]),
                None => Ok(Vec::new()),
            },

            StreamEvent::Complete {
                html,
                correlation_id,
                payload,
            } => {
                if html.trim().is_empty() {
                    // A backend bug producing an empty report must not
                    // silently present a blank success state.
                    warn!(
                        session_id = %self.session_id,
                        correlation_id = %correlation_id,
                        "complete event carried an empty report body"
                    );
                    return Err(CoordinatorError::EmptyReport);
                }

                let mut updates = Vec::new();
                if let Some(index) = self.streaming_message_index() {
                    updates.push(self.finalize_streaming_message(index));
                }

                let incoming = FinalReport {
                    html,
                    correlation_id,
                    payload,
                };
                let merged = reconcile::merge_final(self.final_report.as_ref(), incoming);

                // All subsequent requests on this session correlate to the
                // backend-assigned id.
                if !merged.correlation_id.is_empty() {
                    self.effective_id = merged.correlation_id.clone();
                }

                // Live sections are superseded by the single final report.
                self.sections.clear();
                self.progress = 100;
                self.terminated = true;

                updates.push(SessionUpdate::Completed {
                    html: merged.html.clone(),
                    correlation_id: merged.correlation_id.clone(),
                    payload: merged.payload.clone(),
                });
                self.final_report = Some(merged);
                Ok(updates)
            }

            StreamEvent::Error {
                message,
                error_type,
            } => {
                self.terminated = true;
                Err(CoordinatorError::Backend {
                    message,
                    error_type,
                })
            }
        }
    }

    /// Index of the message currently streaming.
    ///
    /// Tries the tracked pointer first; if the reference has gone stale,
    /// falls back to searching for the unique streaming-and-not-complete
    /// entry. Only after both miss does a caller get to create a new
    /// message.
    pub(crate) fn streaming_message_index(&self) -> Option<usize> {
        if let Some(id) = &self.current_message_id {
            if let Some(index) = self
                .messages
                .iter()
                .position(|m| &m.id == id && m.is_streaming && !m.is_complete)
            {
                return Some(index);
            }
        }
        self.messages
            .iter()
            .position(|m| m.is_streaming && !m.is_complete)
    }

    fn finalize_streaming_message(&mut self, index: usize) -> SessionUpdate {
        let message = &mut self.messages[index];
        message.finalize();
        let update = SessionUpdate::MessageCompleted {
            message_id: message.id.clone(),
            content: message.content.clone(),
        };
        self.current_message_id = None;
        update
    }

    /// Insert or replace the section keyed by `id`, keeping first-insertion
    /// order for display.
    fn upsert_section(
        &mut self,
        id: &str,
        phase: u32,
        html: String,
        progress: u8,
        status: SectionStatus,
    ) {
        let now = Utc::now();
        match self.sections.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                existing.phase = phase;
                existing.html = html;
                existing.progress = progress;
                existing.status = status;
                existing.updated_at = now;
            }
            None => self.sections.push(ReportSection {
                id: id.to_string(),
                phase,
                html,
                progress,
                status,
                updated_at: now,
            }),
        }
    }
}
