//! Transport-level error types.
//!
//! These errors cover the network leg of a stream attempt: opening the
//! connection, reading frames, and wall-clock expiry. Retry eligibility is
//! decided here; everything the backend reports as an application error
//! lives in [`CoordinatorError`](super::CoordinatorError) instead.

use std::fmt;

/// Transport-specific error variants.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// Connection to the engine failed.
    ConnectionFailed { url: String, message: String },

    /// The attempt timed out.
    Timeout { operation: String, duration_secs: u64 },

    /// HTTP status error (non-2xx response).
    HttpStatus { status: u16, message: String },

    /// The stream ended before a terminal event arrived.
    StreamClosed { message: String },

    /// Response was not a streamable body.
    InvalidResponse { message: String },

    /// The attempt was cancelled locally.
    Cancelled,

    /// Generic transport error.
    Other { message: String },
}

impl TransportError {
    /// Check if this error is likely transient and can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. } => true,
            TransportError::Timeout { .. } => true,
            TransportError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            TransportError::StreamClosed { .. } => true,
            TransportError::InvalidResponse { .. } => false,
            TransportError::Cancelled => false,
            TransportError::Other { .. } => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::ConnectionFailed { .. } => {
                "Unable to connect to the valuation engine. Please check your connection."
                    .to_string()
            }
            TransportError::Timeout { operation, duration_secs } => {
                format!(
                    "The {} operation timed out after {} seconds. The engine may be slow or unreachable.",
                    operation, duration_secs
                )
            }
            TransportError::HttpStatus { status, .. } => match *status {
                400 => "The request was invalid. Please try again.".to_string(),
                401 => "Authentication required. Please sign in again.".to_string(),
                404 => "The requested session was not found.".to_string(),
                429 => "Too many requests. Please wait a moment and try again.".to_string(),
                500..=599 => "The engine is experiencing issues. Please try again later.".to_string(),
                _ => format!("The engine returned an error (HTTP {}). Please try again.", status),
            },
            TransportError::StreamClosed { .. } => {
                "The connection was lost before the report finished. Retrying...".to_string()
            }
            TransportError::InvalidResponse { .. } => {
                "Received an invalid response from the engine. Please try again.".to_string()
            }
            TransportError::Cancelled => "The request was cancelled.".to_string(),
            TransportError::Other { message } => format!("Network error: {}", message),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailed { .. } => "E_NET_CONN",
            TransportError::Timeout { .. } => "E_NET_TIMEOUT",
            TransportError::HttpStatus { .. } => "E_NET_HTTP",
            TransportError::StreamClosed { .. } => "E_NET_CLOSED",
            TransportError::InvalidResponse { .. } => "E_NET_INVALID",
            TransportError::Cancelled => "E_NET_CANCEL",
            TransportError::Other { .. } => "E_NET_OTHER",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed { url, message } => {
                write!(f, "Connection failed to '{}': {}", url, message)
            }
            TransportError::Timeout { operation, duration_secs } => {
                write!(f, "{} timed out after {} seconds", operation, duration_secs)
            }
            TransportError::HttpStatus { status, message } => {
                write!(f, "HTTP {} from engine: {}", status, message)
            }
            TransportError::StreamClosed { message } => {
                write!(f, "Stream closed before terminal event: {}", message)
            }
            TransportError::InvalidResponse { message } => {
                write!(f, "Invalid response: {}", message)
            }
            TransportError::Cancelled => write!(f, "Request cancelled"),
            TransportError::Other { message } => write!(f, "Transport error: {}", message),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let url = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if e.is_timeout() {
            TransportError::Timeout {
                operation: "request".to_string(),
                duration_secs: 0,
            }
        } else if e.is_connect() {
            TransportError::ConnectionFailed {
                url,
                message: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            TransportError::HttpStatus {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_body() || e.is_decode() {
            TransportError::StreamClosed {
                message: e.to_string(),
            }
        } else {
            TransportError::Other {
                message: e.to_string(),
            }
        }
    }
}
