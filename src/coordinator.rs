//! Session registry, single-flight lock, and stream orchestration.
//!
//! One [`StreamCoordinator`] serves any number of logical sessions. For
//! each session it guarantees at most one in-flight stream attempt at a
//! time, drives retries through the backoff policy, folds decoded events
//! into the session's state, and forwards the resulting updates to the
//! caller over an unbounded channel.
//!
//! Lock discipline: the flight lock is taken inside `submit` and released
//! by a drop guard owned by the spawned attempt task, so every exit path
//! (completion, fatal error, retries exhausted, abort, panic) releases it.
//! `cancel` additionally releases it synchronously and bumps the attempt
//! generation so events already queued for the old attempt are discarded
//! rather than applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::{StreamTransport, SubmitRequest};
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult, TransportError};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::session::{SessionState, SessionUpdate};

/// Result of a submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new stream attempt was started.
    Started,
    /// An identical submission is already in flight and deduplication is
    /// enabled; the caller keeps receiving that attempt's updates.
    Deduplicated,
    /// A different submission is already in flight for this session.
    Rejected { reason: &'static str },
}

struct SessionEntry {
    state: SessionState,
    lock_held: bool,
    /// Attempt generation. Bumped on every start and on cancel; events
    /// carrying a stale generation are discarded.
    generation: u64,
    /// Handle of the active attempt task. Owned exclusively by the
    /// session; only `cancel`/`dispose` may abort it.
    active: Option<JoinHandle<()>>,
    /// Input of the in-flight attempt, for deduplication.
    in_flight_input: Option<String>,
}

impl SessionEntry {
    fn new(session_id: &str) -> Self {
        Self {
            state: SessionState::new(session_id),
            lock_held: false,
            generation: 0,
            active: None,
            in_flight_input: None,
        }
    }
}

type Registry = Arc<Mutex<HashMap<String, SessionEntry>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Coordinates streaming attempts across sessions.
pub struct StreamCoordinator {
    config: CoordinatorConfig,
    transport: Arc<dyn StreamTransport>,
    sessions: Registry,
}

impl StreamCoordinator {
    pub fn new(config: CoordinatorConfig, transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            config,
            transport,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a stream attempt for the session if it is idle.
    ///
    /// Updates for the attempt (and for any retries of it) arrive on
    /// `updates`. The terminal update is either `Completed` or `Failed`;
    /// a cancelled attempt emits neither.
    pub fn submit(
        &self,
        session_id: &str,
        input: &str,
        updates: mpsc::UnboundedSender<SessionUpdate>,
    ) -> CoordinatorResult<SubmitOutcome> {
        if input.trim().is_empty() {
            return Err(CoordinatorError::InvalidInput {
                message: "input must not be empty".to_string(),
            });
        }

        let (generation, request) = {
            let mut sessions = lock(&self.sessions);
            let entry = sessions
                .entry(session_id.to_string())
                .or_insert_with(|| SessionEntry::new(session_id));

            if entry.lock_held {
                if self.config.enable_deduplication
                    && entry.in_flight_input.as_deref() == Some(input)
                {
                    debug!(session_id, "identical submission already in flight, merging");
                    return Ok(SubmitOutcome::Deduplicated);
                }
                debug!(session_id, "submission rejected, attempt already in flight");
                return Ok(SubmitOutcome::Rejected { reason: "in_flight" });
            }

            entry.lock_held = true;
            entry.generation += 1;
            entry.in_flight_input = Some(input.to_string());
            entry.state.begin_attempt();
            let request = SubmitRequest::new(entry.state.effective_id.clone(), input);
            (entry.generation, request)
        };

        let transport = Arc::clone(&self.transport);
        let sessions = Arc::clone(&self.sessions);
        let config = self.config.clone();
        let session_key = session_id.to_string();

        let handle = tokio::spawn(async move {
            let _guard = FlightGuard {
                sessions: Arc::clone(&sessions),
                session_id: session_key.clone(),
                generation,
            };

            let policy = RetryPolicy::from(&config);
            let result = run_with_retry(policy, |attempt| {
                run_attempt(
                    Arc::clone(&transport),
                    Arc::clone(&sessions),
                    session_key.clone(),
                    generation,
                    request.clone(),
                    updates.clone(),
                    config.timeout,
                    attempt,
                )
            })
            .await;

            match result {
                Ok(AttemptOutcome::Completed) => {
                    info!(session_id = %session_key, "stream attempt completed");
                }
                Ok(AttemptOutcome::Superseded) => {
                    debug!(session_id = %session_key, "stream attempt superseded");
                }
                Err(e) => {
                    error!(
                        session_id = %session_key,
                        code = e.error_code(),
                        error = %e,
                        "stream attempt failed"
                    );
                    // Partial sections/messages stay in the session state;
                    // only the failure itself is surfaced.
                    let _ = updates.send(SessionUpdate::Failed {
                        message: e.user_message(),
                        error_type: e.error_type(),
                    });
                }
            }
        });

        let mut sessions = lock(&self.sessions);
        match sessions.get_mut(session_id) {
            Some(entry) if entry.lock_held && entry.generation == generation => {
                entry.active = Some(handle);
            }
            // A cancel or dispose raced in between the spawn and this
            // store; it found no handle to abort, so stop the task here.
            _ => handle.abort(),
        }
        Ok(SubmitOutcome::Started)
    }

    /// Abort the active attempt, discard its queued events, and release
    /// the lock synchronously. A cancelled session immediately accepts a
    /// new submission.
    pub fn cancel(&self, session_id: &str) {
        let handle = {
            let mut sessions = lock(&self.sessions);
            let Some(entry) = sessions.get_mut(session_id) else {
                return;
            };
            entry.generation += 1;
            entry.lock_held = false;
            entry.in_flight_input = None;
            entry.active.take()
        };
        if let Some(handle) = handle {
            handle.abort();
            debug!(session_id, "cancelled active stream attempt");
        }
    }

    /// Tear down the session entirely (e.g. the caller navigated away).
    pub fn dispose(&self, session_id: &str) {
        self.cancel(session_id);
        lock(&self.sessions).remove(session_id);
    }

    /// Clone of the session's current state, for rendering partials on
    /// re-entry. `None` if the session has never been submitted.
    pub fn snapshot(&self, session_id: &str) -> Option<SessionState> {
        lock(&self.sessions)
            .get(session_id)
            .map(|entry| entry.state.clone())
    }

    /// Whether the session currently has no attempt in flight.
    pub fn is_idle(&self, session_id: &str) -> bool {
        lock(&self.sessions)
            .get(session_id)
            .map(|entry| !entry.lock_held)
            .unwrap_or(true)
    }
}

/// Releases the flight lock when the attempt task ends, on every path.
struct FlightGuard {
    sessions: Registry,
    session_id: String,
    generation: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut sessions = lock(&self.sessions);
        if let Some(entry) = sessions.get_mut(&self.session_id) {
            // A newer attempt (or a synchronous cancel) owns the entry now.
            if entry.generation == self.generation {
                entry.lock_held = false;
                entry.active = None;
                entry.in_flight_input = None;
            }
        }
    }
}

enum AttemptOutcome {
    Completed,
    Superseded,
}

#[allow(clippy::too_many_arguments)]
async fn run_attempt(
    transport: Arc<dyn StreamTransport>,
    sessions: Registry,
    session_id: String,
    generation: u64,
    request: SubmitRequest,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    timeout: Duration,
    attempt: u32,
) -> CoordinatorResult<AttemptOutcome> {
    debug!(session_id = %session_id, attempt, "opening stream attempt");

    {
        let mut registry = lock(&sessions);
        match registry.get_mut(&session_id) {
            Some(entry) if entry.generation == generation => entry.state.begin_attempt(),
            _ => return Ok(AttemptOutcome::Superseded),
        }
    }

    let attempt_future = async {
        let mut stream = transport
            .open(&request)
            .await
            .map_err(CoordinatorError::from)?;

        while let Some(item) = stream.next().await {
            let event = item.map_err(CoordinatorError::from)?;
            let terminal = event.is_terminal();

            let batch = {
                let mut registry = lock(&sessions);
                let Some(entry) = registry.get_mut(&session_id) else {
                    return Ok(AttemptOutcome::Superseded);
                };
                if entry.generation != generation {
                    debug!(session_id = %session_id, "discarding event for superseded attempt");
                    return Ok(AttemptOutcome::Superseded);
                }
                entry.state.apply(event)?
            };

            for update in batch {
                let _ = updates.send(update);
            }
            if terminal {
                return Ok(AttemptOutcome::Completed);
            }
        }

        // The connection dropped without `complete`/`error`; let the
        // retry controller classify it.
        Err(CoordinatorError::Transport(TransportError::StreamClosed {
            message: "stream ended before terminal event".to_string(),
        }))
    };

    match tokio::time::timeout(timeout, attempt_future).await {
        Ok(result) => result,
        Err(_) => Err(CoordinatorError::Transport(TransportError::Timeout {
            operation: "stream attempt".to_string(),
            duration_secs: timeout.as_secs(),
        })),
    }
}
