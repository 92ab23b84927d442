//! Mock transport for testing.
//!
//! Provides a configurable [`StreamTransport`] double that replays scripted
//! attempts, records submitted requests for verification, and can simulate
//! connection failures and streams that never finish.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::client::{EventStream, StreamTransport, SubmitRequest};
use crate::error::TransportError;
use crate::events::StreamEvent;

/// One scripted stream attempt.
pub enum ScriptedAttempt {
    /// Fail before the first byte.
    FailOpen(TransportError),
    /// Deliver the items in order, then end the stream.
    Events(Vec<Result<StreamEvent, TransportError>>),
    /// Deliver the items in order, then pend forever. Used to exercise
    /// cancellation and timeouts mid-stream.
    EventsThenHang(Vec<Result<StreamEvent, TransportError>>),
}

/// Scripted [`StreamTransport`] for tests.
///
/// Attempts are consumed in FIFO order; opening with an empty script
/// yields an empty stream.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<ScriptedAttempt>>>,
    requests: Arc<Mutex<Vec<SubmitRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next attempt's behavior.
    pub fn push_attempt(&self, attempt: ScriptedAttempt) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(attempt);
    }

    /// All requests opened so far, in order.
    pub fn requests(&self) -> Vec<SubmitRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of attempts opened so far.
    pub fn open_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn open(&self, request: &SubmitRequest) -> Result<EventStream, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let attempt = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match attempt {
            None => Ok(Box::pin(stream::empty())),
            Some(ScriptedAttempt::FailOpen(e)) => Err(e),
            Some(ScriptedAttempt::Events(items)) => Ok(Box::pin(stream::iter(items))),
            Some(ScriptedAttempt::EventsThenHang(items)) => {
                Ok(Box::pin(stream::iter(items).chain(stream::pending())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_scripted_events_in_order() {
        let transport = MockTransport::new();
        transport.push_attempt(ScriptedAttempt::Events(vec![
            Ok(StreamEvent::Progress {
                progress: 10,
                message: None,
            }),
            Ok(StreamEvent::MessageComplete),
        ]));

        let mut stream = transport
            .open(&SubmitRequest::new("sess-1", "hello"))
            .await
            .unwrap();
        assert_eq!(
            stream.next().await.unwrap().unwrap().event_type_name(),
            "progress"
        );
        assert_eq!(
            stream.next().await.unwrap().unwrap().event_type_name(),
            "message_complete"
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_records_requests() {
        let transport = MockTransport::new();
        transport
            .open(&SubmitRequest::new("sess-1", "first"))
            .await
            .unwrap();
        transport
            .open(&SubmitRequest::new("sess-1", "second"))
            .await
            .unwrap();
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].input, "first");
        assert_eq!(requests[1].input, "second");
    }

    #[tokio::test]
    async fn test_fail_open() {
        let transport = MockTransport::new();
        transport.push_attempt(ScriptedAttempt::FailOpen(TransportError::ConnectionFailed {
            url: "http://engine".to_string(),
            message: "refused".to_string(),
        }));
        let result = transport.open(&SubmitRequest::new("sess-1", "hello")).await;
        assert!(result.is_err());
    }
}
