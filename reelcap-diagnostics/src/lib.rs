//! # reelcap diagnostics
//!
//! Logging initialisation and per-session traces for the capture workflow.

#![warn(clippy::all)]

pub mod debug_logger;
pub mod session_trace;

// Re-export main types
pub use debug_logger::DebugLogger;
pub use session_trace::{PhaseRecord, SessionReport, SessionTrace, UploadAttempt};
