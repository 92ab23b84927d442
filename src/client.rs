//! HTTP client for the valuation engine's streaming API.
//!
//! Submits `{ session_id, input, user_id? }` to the stream endpoint and
//! turns the response body into a stream of decoded [`StreamEvent`]s. The
//! [`StreamTransport`] trait is the seam the coordinator depends on, so
//! tests can substitute scripted streams for the network.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::decoder::FrameDecoder;
use crate::error::TransportError;
use crate::events::StreamEvent;

pub const ENGINE_BASE_URL: &str = "http://localhost:8000";

/// A live stream of decoded events for one attempt.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

/// Body of the stream-initiating call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitRequest {
    /// Effective session id; the backend's correlation id once assigned.
    pub session_id: String,
    /// The user's input text.
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SubmitRequest {
    pub fn new(session_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            input: input.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Transport abstraction over "open a stream attempt".
///
/// Restartable per invocation, not resumable mid-stream: a dropped
/// connection ends the sequence with a transport error and the retry
/// controller decides what happens next.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, request: &SubmitRequest) -> Result<EventStream, TransportError>;
}

/// Client for the valuation engine API.
pub struct EngineClient {
    pub base_url: String,
    client: Client,
}

impl EngineClient {
    /// Create a client against the default base URL.
    pub fn new() -> Self {
        Self::with_base_url(ENGINE_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Open a streaming response for the given submission.
    ///
    /// Sends a POST to `/api/valuation/stream`; the response is a
    /// continuous newline-delimited event stream, not a single document.
    pub async fn stream(&self, request: &SubmitRequest) -> Result<EventStream, TransportError> {
        let url = format!("{}/api/valuation/stream", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/x-ndjson")
            .json(request)
            .send()
            .await
            .map_err(TransportError::from)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::HttpStatus { status, message });
        }

        let bytes_stream = response.bytes_stream();

        // Decode the byte stream chunk by chunk; pending holds events the
        // last chunk completed but the consumer has not pulled yet.
        let event_stream = stream::unfold(
            (bytes_stream, FrameDecoder::new(), VecDeque::new(), false),
            |(mut bytes_stream, mut decoder, mut pending, mut done)| async move {
                loop {
                    if let Some(event) = pending.pop_front() {
                        return Some((Ok(event), (bytes_stream, decoder, pending, done)));
                    }
                    if done {
                        return None;
                    }

                    match bytes_stream.next().await {
                        Some(Ok(chunk)) => {
                            pending.extend(decoder.feed(&chunk));
                        }
                        Some(Err(e)) => {
                            done = true;
                            return Some((
                                Err(TransportError::from(e)),
                                (bytes_stream, decoder, pending, done),
                            ));
                        }
                        None => {
                            done = true;
                            if let Some(event) = decoder.finish() {
                                pending.push_back(event);
                            }
                        }
                    }
                }
            },
        );

        Ok(Box::pin(event_stream))
    }
}

impl Default for EngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamTransport for EngineClient {
    async fn open(&self, request: &SubmitRequest) -> Result<EventStream, TransportError> {
        self.stream(request).await
    }
}
