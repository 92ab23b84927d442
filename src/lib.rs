//! valstream - streaming response coordinator for the valuation engine
//!
//! Opens incrementally delivered response streams against the engine's
//! conversational valuation API, decodes typed partial-result events,
//! accumulates them into consistent per-session state, retries transient
//! failures with bounded backoff, and guarantees at most one in-flight
//! stream per logical session.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod events;
pub mod mock;
pub mod retry;
pub mod session;

pub use client::{EngineClient, StreamTransport, SubmitRequest};
pub use config::CoordinatorConfig;
pub use coordinator::{StreamCoordinator, SubmitOutcome};
pub use error::{CoordinatorError, CoordinatorResult, TransportError};
pub use events::StreamEvent;
pub use session::{
    FinalReport, Message, ReportSection, SectionStatus, SessionState, SessionUpdate,
};
