//! Common test utilities for integration tests.
//!
//! Provides event builders, a fast retry/timeout configuration, and a
//! helper to drain coordinator updates up to the terminal one.

use std::sync::Once;
use std::time::Duration;

use tokio::sync::mpsc;

use valstream::{CoordinatorConfig, SessionUpdate, StreamEvent};

static INIT_TRACING: Once = Once::new();

/// Install a tracing subscriber once per test binary, honoring RUST_LOG.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Configuration with millisecond backoff so retry tests stay fast.
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig::new()
        .with_timeout(Duration::from_secs(5))
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(10))
}

pub fn progress(progress: u8) -> StreamEvent {
    StreamEvent::Progress {
        progress,
        message: None,
    }
}

pub fn section_loading(section: &str, phase: u32) -> StreamEvent {
    StreamEvent::SectionLoading {
        section: section.to_string(),
        phase,
        progress: 0,
    }
}

pub fn section_update(section: &str, html: &str, phase: u32) -> StreamEvent {
    StreamEvent::SectionUpdate {
        section: section.to_string(),
        html: html.to_string(),
        phase,
        progress: 100,
    }
}

pub fn chunk(content: &str) -> StreamEvent {
    StreamEvent::MessageChunk {
        content: content.to_string(),
        is_complete: false,
    }
}

pub fn complete(html: &str, correlation_id: &str) -> StreamEvent {
    StreamEvent::Complete {
        html: html.to_string(),
        correlation_id: correlation_id.to_string(),
        payload: serde_json::Map::new(),
    }
}

/// Receive updates until `Completed` or `Failed` arrives.
pub async fn drain_until_terminal(
    rx: &mut mpsc::UnboundedReceiver<SessionUpdate>,
) -> Vec<SessionUpdate> {
    let mut received = Vec::new();
    while let Some(update) = rx.recv().await {
        let terminal = matches!(
            update,
            SessionUpdate::Completed { .. } | SessionUpdate::Failed { .. }
        );
        received.push(update);
        if terminal {
            break;
        }
    }
    received
}
