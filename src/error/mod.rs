//! Error handling for the streaming coordinator.
//!
//! Two layers:
//!
//! - [`TransportError`]: the network leg of an attempt. Carries its own
//!   retry classification (connection failures, timeouts, and 5xx-class
//!   statuses are transient; everything else is not).
//! - [`CoordinatorError`]: everything a stream attempt can fail with.
//!   Wraps transport errors and adds backend-reported errors and
//!   validation failures, which are fatal immediately: they indicate a
//!   backend or caller bug, not transient unavailability.
//!
//! Protocol-level noise (malformed frames, unknown event types) never
//! becomes an error at all; the decoder logs and skips those.

mod transport;

pub use transport::TransportError;

use std::fmt;

/// Result alias used across the crate.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Top-level error for a stream attempt.
#[derive(Debug, Clone)]
pub enum CoordinatorError {
    /// Network failure, subject to the retry policy.
    Transport(TransportError),

    /// The backend reported an error via an `error` stream event.
    Backend {
        message: String,
        error_type: Option<String>,
    },

    /// A `complete` event arrived with an empty or missing report body.
    /// Finalizing would silently present a blank success state, so this is
    /// treated as fatal rather than retried.
    EmptyReport,

    /// Input failed precondition checks before submission.
    InvalidInput { message: String },
}

impl CoordinatorError {
    /// Check if this error is transient and eligible for retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoordinatorError::Transport(e) => e.is_retryable(),
            CoordinatorError::Backend { .. } => false,
            CoordinatorError::EmptyReport => false,
            CoordinatorError::InvalidInput { .. } => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            CoordinatorError::Transport(e) => e.user_message(),
            CoordinatorError::Backend { message, .. } => {
                format!("The valuation engine reported an error: {}", message)
            }
            CoordinatorError::EmptyReport => {
                "The engine returned an empty report. Please try again.".to_string()
            }
            CoordinatorError::InvalidInput { message } => {
                format!("Invalid input: {}", message)
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoordinatorError::Transport(e) => e.error_code(),
            CoordinatorError::Backend { .. } => "E_BACKEND",
            CoordinatorError::EmptyReport => "E_EMPTY_REPORT",
            CoordinatorError::InvalidInput { .. } => "E_INPUT",
        }
    }

    /// The `error_type` tag surfaced to callers, matching the wire field
    /// where one exists.
    pub fn error_type(&self) -> String {
        match self {
            CoordinatorError::Transport(_) => "transport".to_string(),
            CoordinatorError::Backend { error_type, .. } => error_type
                .clone()
                .unwrap_or_else(|| "backend".to_string()),
            CoordinatorError::EmptyReport => "validation".to_string(),
            CoordinatorError::InvalidInput { .. } => "validation".to_string(),
        }
    }
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::Transport(e) => write!(f, "Transport error: {}", e),
            CoordinatorError::Backend { message, error_type } => match error_type {
                Some(t) => write!(f, "Backend error [{}]: {}", t, message),
                None => write!(f, "Backend error: {}", message),
            },
            CoordinatorError::EmptyReport => {
                write!(f, "Complete event carried an empty report body")
            }
            CoordinatorError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for CoordinatorError {
    fn from(e: TransportError) -> Self {
        CoordinatorError::Transport(e)
    }
}
